#[doc(hidden)]
#[macro_export]
macro_rules! dict {
    ($($key:expr => $value:expr),* $(,)?) => ({
        #[allow(unused_mut)]
        let mut dict: $crate::value::Dict = $crate::value::Dict::new();
        $(dict.insert($key.into(), $crate::value::Value::from($value));)*
        dict
    });
}

pub use dict;

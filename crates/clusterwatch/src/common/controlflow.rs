/// Unwraps an `Option`, or returns from the enclosing function when it is `None`.
#[macro_export]
macro_rules! get_or_return {
    ($e:expr) => {
        match $e {
            Some(v) => v,
            None => return,
        }
    };
}

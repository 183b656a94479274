#[macro_export]
macro_rules! assert_interval {
    ($var:expr, $low:expr, $high:expr) => {
        assert!(
            $var >= $low && $var <= $high,
            "Value of `{}` is not in the interval [{}, {}].",
            stringify!($var),
            $low,
            $high
        );
    };
}

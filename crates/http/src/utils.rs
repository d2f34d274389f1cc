/// Returns early with `$error` when `$predicate` does not hold.
///
/// ```ignore
/// ensure!(header_lines <= max_headers, ParseError::too_many_headers(max_headers));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;

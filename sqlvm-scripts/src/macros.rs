// SPDX-License-Identifier: MIT

#[macro_export]
macro_rules! args {
    ( $( $x:expr ),* ) => {
        vec![ $( $x.to_string() ),* ]
    };
}

/// Joins cmdlet words into one script line.
pub trait ToLine {
    fn to_line(self) -> String;
}

impl<I, S> ToLine for I
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fn to_line(self) -> String {
        self.into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub mod answer;
pub mod question;
pub mod test;
pub mod test_attempt;

#[cfg(test)]
pub(crate) mod fixtures;

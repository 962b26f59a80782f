pub mod errors;
pub mod db;
pub mod user;
pub mod blacklisted_token;

#[cfg(test)]
mod tests;

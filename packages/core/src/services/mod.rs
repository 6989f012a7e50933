pub mod freecurrency;

#[cfg(test)]
pub mod mock_provider;

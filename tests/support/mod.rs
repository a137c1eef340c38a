pub mod helpers;
pub mod mock_chain;
pub mod mock_service;

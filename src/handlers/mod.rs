pub mod cache_handler;

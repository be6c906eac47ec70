pub mod pool_manager;

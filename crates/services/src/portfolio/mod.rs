pub mod allocator_service;

pub use allocator_service::AllocatorService;

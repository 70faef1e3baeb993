pub mod gateway;
pub mod pinata;
pub mod traits;

pub use gateway::IpfsGateway;
pub use pinata::PinataClient;
pub use traits::PinningService;

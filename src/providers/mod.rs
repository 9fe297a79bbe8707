pub mod birdeye;
pub mod moralis;
pub mod util;

pub use birdeye::BirdeyeProvider;
pub use moralis::MoralisProvider;

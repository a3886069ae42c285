pub mod crying;
pub mod movement;
pub mod position;

pub use crying::CryingDetector;
pub use movement::MovementDetector;
pub use position::PositionDetector;

mod connack;
mod connect;
mod puback;
mod publish;
mod suback;
mod subscribe;
mod unsuback;
mod unsubscribe;

pub use self::connack::*;
pub use self::connect::*;
pub use self::puback::*;
pub use self::publish::*;
pub use self::suback::*;
pub use self::subscribe::*;
pub use self::unsuback::*;
pub use self::unsubscribe::*;

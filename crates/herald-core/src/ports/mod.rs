//! Ports - 抽象化レイヤー
//!
//! ディスパッチャが外部（時刻、ID 生成、本文デコード、auditor）に依存する
//! 境界を trait として定義します。

pub mod auditor;
pub mod clock;
pub mod codec;
pub mod id_generator;

pub use self::auditor::{AuditorError, MessageAuditor};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::codec::{JsonCodec, MessageCodec};
pub use self::id_generator::{IdGenerator, UlidGenerator};

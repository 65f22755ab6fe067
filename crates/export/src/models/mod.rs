mod identifier;
mod kind;
mod record;

pub use self::identifier::Identifier;
pub use self::kind::MediaKind;
pub use self::record::{Location, MemoryRecord, RecordTable};

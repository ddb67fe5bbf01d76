use crate::errors::JdResult;
use bytes::{Bytes, BytesMut};

pub trait ArchiveParser {
    fn from_bytes(data: &mut Bytes) -> JdResult<Self>
    where
        Self: Sized;
}

pub trait ArchiveWriter {
    fn to_bytes(&self, buffer: &mut BytesMut) -> JdResult<()>;
}

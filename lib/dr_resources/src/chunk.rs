use std::fmt;

/// The common resource chunk header: type tag, header size, total chunk
/// size (header included).
#[derive(Debug)]
pub(crate) struct ChunkHeader {
    pub(crate) typ: ChunkType,
    pub(crate) header_size: usize,
    pub(crate) chunk_size: usize,
}

/// Resource chunk type tags. Tags that the decoders do not interpret are
/// kept as [`ChunkType::Other`] so that containers can skip them by their
/// declared size instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChunkType {
    Null,
    StringPool,
    Table,
    Xml,
    XmlStartNamespace,
    XmlEndNamespace,
    XmlStartElement,
    XmlEndElement,
    XmlCdata,
    XmlResourceMap,
    TablePackage,
    TableType,
    TableTypeSpec,
    Other(u16),
}

impl From<u16> for ChunkType {
    fn from(v: u16) -> Self {
        match v {
            0x0000 => Self::Null,
            0x0001 => Self::StringPool,
            0x0002 => Self::Table,
            0x0003 => Self::Xml,
            0x0100 => Self::XmlStartNamespace,
            0x0101 => Self::XmlEndNamespace,
            0x0102 => Self::XmlStartElement,
            0x0103 => Self::XmlEndElement,
            0x0104 => Self::XmlCdata,
            0x0180 => Self::XmlResourceMap,
            0x0200 => Self::TablePackage,
            0x0201 => Self::TableType,
            0x0202 => Self::TableTypeSpec,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Null => write!(f, "RES_NULL_TYPE"),
            Self::StringPool => write!(f, "RES_STRING_POOL_TYPE"),
            Self::Table => write!(f, "RES_TABLE_TYPE"),
            Self::Xml => write!(f, "RES_XML_TYPE"),
            Self::XmlStartNamespace => write!(f, "RES_XML_START_NAMESPACE_TYPE"),
            Self::XmlEndNamespace => write!(f, "RES_XML_END_NAMESPACE_TYPE"),
            Self::XmlStartElement => write!(f, "RES_XML_START_ELEMENT_TYPE"),
            Self::XmlEndElement => write!(f, "RES_XML_END_ELEMENT_TYPE"),
            Self::XmlCdata => write!(f, "RES_XML_CDATA_TYPE"),
            Self::XmlResourceMap => write!(f, "RES_XML_RESOURCE_MAP_TYPE"),
            Self::TablePackage => write!(f, "RES_TABLE_PACKAGE_TYPE"),
            Self::TableType => write!(f, "RES_TABLE_TYPE_TYPE"),
            Self::TableTypeSpec => write!(f, "RES_TABLE_TYPE_SPEC_TYPE"),
            Self::Other(tag) => write!(f, "RES_UNKNOWN_TYPE({tag:#06x})"),
        }
    }
}

//! Typed views of the raw type, subtype and conversion codes.

use sciter_sys::*;

/// Primary value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Undefined,
    Null,
    Bool,
    Int,
    Float,
    String,
    Date,
    Currency,
    Length,
    Array,
    Map,
    Function,
    Bytes,
    Object,
    DomObject,
    Resource,
    Range,
    Duration,
    Angle,
    Color,
    /// A type code this crate does not know about
    Other(u32),
}

impl ValueType {
    /// Decode a raw `VALUE::t`
    pub fn from_raw(t: UINT) -> Self {
        match t {
            T_UNDEFINED => Self::Undefined,
            T_NULL => Self::Null,
            T_BOOL => Self::Bool,
            T_INT => Self::Int,
            T_FLOAT => Self::Float,
            T_STRING => Self::String,
            T_DATE => Self::Date,
            T_CURRENCY => Self::Currency,
            T_LENGTH => Self::Length,
            T_ARRAY => Self::Array,
            T_MAP => Self::Map,
            T_FUNCTION => Self::Function,
            T_BYTES => Self::Bytes,
            T_OBJECT => Self::Object,
            T_DOM_OBJECT => Self::DomObject,
            T_RESOURCE => Self::Resource,
            T_RANGE => Self::Range,
            T_DURATION => Self::Duration,
            T_ANGLE => Self::Angle,
            T_COLOR => Self::Color,
            other => Self::Other(other),
        }
    }

    pub fn raw(self) -> UINT {
        match self {
            Self::Undefined => T_UNDEFINED,
            Self::Null => T_NULL,
            Self::Bool => T_BOOL,
            Self::Int => T_INT,
            Self::Float => T_FLOAT,
            Self::String => T_STRING,
            Self::Date => T_DATE,
            Self::Currency => T_CURRENCY,
            Self::Length => T_LENGTH,
            Self::Array => T_ARRAY,
            Self::Map => T_MAP,
            Self::Function => T_FUNCTION,
            Self::Bytes => T_BYTES,
            Self::Object => T_OBJECT,
            Self::DomObject => T_DOM_OBJECT,
            Self::Resource => T_RESOURCE,
            Self::Range => T_RANGE,
            Self::Duration => T_DURATION,
            Self::Angle => T_ANGLE,
            Self::Color => T_COLOR,
            Self::Other(t) => t,
        }
    }

    /// Lowercase name used in debug output and type errors
    pub fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Date => "date",
            Self::Currency => "currency",
            Self::Length => "length",
            Self::Array => "array",
            Self::Map => "map",
            Self::Function => "function",
            Self::Bytes => "bytes",
            Self::Object => "object",
            Self::DomObject => "dom_object",
            Self::Resource => "resource",
            Self::Range => "range",
            Self::Duration => "duration",
            Self::Angle => "angle",
            Self::Color => "color",
            Self::Other(_) => "unknown",
        }
    }
}

/// Subtype of [`ValueType::String`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringKind {
    Plain,
    Error,
    Secure,
    File,
    Symbol,
}

impl StringKind {
    pub fn from_raw(u: UINT) -> Option<Self> {
        match u {
            UT_STRING_STRING => Some(Self::Plain),
            UT_STRING_ERROR => Some(Self::Error),
            UT_STRING_SECURE => Some(Self::Secure),
            UT_STRING_FILE => Some(Self::File),
            UT_STRING_SYMBOL => Some(Self::Symbol),
            _ => None,
        }
    }

    pub fn raw(self) -> UINT {
        match self {
            Self::Plain => UT_STRING_STRING,
            Self::Error => UT_STRING_ERROR,
            Self::Secure => UT_STRING_SECURE,
            Self::File => UT_STRING_FILE,
            Self::Symbol => UT_STRING_SYMBOL,
        }
    }
}

/// Subtype of [`ValueType::Object`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Array,
    Object,
    Class,
    Native,
    Function,
    Error,
}

impl ObjectKind {
    pub fn from_raw(u: UINT) -> Option<Self> {
        match u {
            UT_OBJECT_ARRAY => Some(Self::Array),
            UT_OBJECT_OBJECT => Some(Self::Object),
            UT_OBJECT_CLASS => Some(Self::Class),
            UT_OBJECT_NATIVE => Some(Self::Native),
            UT_OBJECT_FUNCTION => Some(Self::Function),
            UT_OBJECT_ERROR => Some(Self::Error),
            _ => None,
        }
    }
}

/// Unit of a [`ValueType::Length`] value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LengthUnit {
    None,
    Em,
    Ex,
    Percent,
    Spring,
    Px,
    In,
    Cm,
    Mm,
    Pt,
    Pc,
    Dip,
    Url,
}

impl LengthUnit {
    pub fn raw(self) -> UINT {
        match self {
            Self::None => UT_NONE,
            Self::Em => UT_EM,
            Self::Ex => UT_EX,
            Self::Percent => UT_PR,
            Self::Spring => UT_SP,
            Self::Px => UT_PX,
            Self::In => UT_IN,
            Self::Cm => UT_CM,
            Self::Mm => UT_MM,
            Self::Pt => UT_PT,
            Self::Pc => UT_PC,
            Self::Dip => UT_DIP,
            Self::Url => UT_URL,
        }
    }
}

/// Text conversion mode for parsing and rendering literals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Conversion {
    /// Plain text, no parsing
    Simple,
    /// JSON literal
    #[default]
    JsonLiteral,
    /// Body of a JSON object without the enclosing braces
    JsonMap,
    /// JSON with engine extensions
    XJsonLiteral,
}

impl Conversion {
    pub fn raw(self) -> UINT {
        match self {
            Self::Simple => CVT_SIMPLE,
            Self::JsonLiteral => CVT_JSON_LITERAL,
            Self::JsonMap => CVT_JSON_MAP,
            Self::XJsonLiteral => CVT_XJSON_LITERAL,
        }
    }
}

//! Java types as seen by the lowering engine.
//!
//! The host resolves every expression's type before handing the arena over;
//! the engine only needs enough structure to declare variables, pick boxed
//! element types for hoisted collections, and recognize stream, optional and
//! collection shapes.
//!
//! # Design
//!
//! Class names are stored qualified, except `java.lang` names which are
//! stored in their simple form (`Integer`, `String`). That package is
//! implicitly imported everywhere, so the canonical text and the source text
//! coincide and two spellings of the same type compare equal.

use std::fmt;

const JAVA_LANG: &str = "java.lang.";

/// Java primitive types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveType {
    /// The keyword spelling (`int`, `long`, ...).
    pub const fn keyword(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Char => "char",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
        }
    }

    /// Simple name of the wrapper class.
    pub const fn boxed_name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::Byte => "Byte",
            PrimitiveType::Char => "Character",
            PrimitiveType::Short => "Short",
            PrimitiveType::Int => "Integer",
            PrimitiveType::Long => "Long",
            PrimitiveType::Float => "Float",
            PrimitiveType::Double => "Double",
        }
    }

    /// Zero value used to seed accumulators.
    pub const fn default_value(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "false",
            PrimitiveType::Char => "'\\0'",
            PrimitiveType::Byte | PrimitiveType::Short | PrimitiveType::Int => "0",
            PrimitiveType::Long => "0L",
            PrimitiveType::Float => "0.0f",
            PrimitiveType::Double => "0.0",
        }
    }

    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            PrimitiveType::Byte
                | PrimitiveType::Char
                | PrimitiveType::Short
                | PrimitiveType::Int
                | PrimitiveType::Long
        )
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "boolean" => PrimitiveType::Boolean,
            "byte" => PrimitiveType::Byte,
            "char" => PrimitiveType::Char,
            "short" => PrimitiveType::Short,
            "int" => PrimitiveType::Int,
            "long" => PrimitiveType::Long,
            "float" => PrimitiveType::Float,
            "double" => PrimitiveType::Double,
            _ => return None,
        })
    }

    /// Resolve a wrapper class name (simple or `java.lang`-qualified).
    pub fn from_boxed(name: &str) -> Option<Self> {
        let name = name.strip_prefix(JAVA_LANG).unwrap_or(name);
        Some(match name {
            "Boolean" => PrimitiveType::Boolean,
            "Byte" => PrimitiveType::Byte,
            "Character" => PrimitiveType::Char,
            "Short" => PrimitiveType::Short,
            "Integer" => PrimitiveType::Int,
            "Long" => PrimitiveType::Long,
            "Float" => PrimitiveType::Float,
            "Double" => PrimitiveType::Double,
            _ => return None,
        })
    }
}

/// Bound of a wildcard type argument.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WildcardBound {
    Unbounded,
    Extends(Box<JavaType>),
    Super(Box<JavaType>),
}

/// A resolved Java type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JavaType {
    Primitive(PrimitiveType),
    Void,
    /// Class, interface or type variable with its type arguments.
    Class { name: String, args: Vec<JavaType> },
    Array(Box<JavaType>),
    Wildcard(WildcardBound),
    /// Type of the `null` literal.
    Null,
}

impl JavaType {
    pub const BOOLEAN: JavaType = JavaType::Primitive(PrimitiveType::Boolean);
    pub const INT: JavaType = JavaType::Primitive(PrimitiveType::Int);
    pub const LONG: JavaType = JavaType::Primitive(PrimitiveType::Long);
    pub const DOUBLE: JavaType = JavaType::Primitive(PrimitiveType::Double);

    // Constructors

    /// A non-generic class type.
    pub fn class(name: impl Into<String>) -> Self {
        Self::generic(name, Vec::new())
    }

    /// A parameterized class type.
    pub fn generic(name: impl Into<String>, args: Vec<JavaType>) -> Self {
        let name = name.into();
        let name = match name.strip_prefix(JAVA_LANG) {
            Some(simple) if !simple.contains('.') => simple.to_owned(),
            _ => name,
        };
        JavaType::Class { name, args }
    }

    pub fn array(component: JavaType) -> Self {
        JavaType::Array(Box::new(component))
    }

    pub fn string() -> Self {
        Self::class("String")
    }

    pub fn object() -> Self {
        Self::class("Object")
    }

    /// Stream type carrying `element`: `IntStream` for `int`, `Stream<T>` otherwise.
    pub fn stream_of(element: &JavaType) -> Self {
        match element {
            JavaType::Primitive(PrimitiveType::Int) => Self::class("java.util.stream.IntStream"),
            JavaType::Primitive(PrimitiveType::Long) => Self::class("java.util.stream.LongStream"),
            JavaType::Primitive(PrimitiveType::Double) => {
                Self::class("java.util.stream.DoubleStream")
            }
            other => Self::generic("java.util.stream.Stream", vec![other.boxed()]),
        }
    }

    pub fn list_of(element: &JavaType) -> Self {
        Self::generic("java.util.List", vec![element.boxed()])
    }

    pub fn set_of(element: &JavaType) -> Self {
        Self::generic("java.util.Set", vec![element.boxed()])
    }

    pub fn map_of(key: &JavaType, value: &JavaType) -> Self {
        Self::generic("java.util.Map", vec![key.boxed(), value.boxed()])
    }

    /// Optional type carrying `element`: `OptionalInt` for `int`, `Optional<T>` otherwise.
    pub fn optional_of(element: &JavaType) -> Self {
        match element {
            JavaType::Primitive(PrimitiveType::Int) => Self::class("java.util.OptionalInt"),
            JavaType::Primitive(PrimitiveType::Long) => Self::class("java.util.OptionalLong"),
            JavaType::Primitive(PrimitiveType::Double) => Self::class("java.util.OptionalDouble"),
            other => Self::generic("java.util.Optional", vec![other.boxed()]),
        }
    }

    // Queries

    pub fn is_primitive(&self) -> bool {
        matches!(self, JavaType::Primitive(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, JavaType::Void)
    }

    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            JavaType::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// Integral primitive or its wrapper. Comparisons between these unbox,
    /// so flipping `<` to `>=` is exact.
    pub fn is_integral(&self) -> bool {
        self.unboxed().is_some_and(PrimitiveType::is_integral)
    }

    /// Fully qualified name of a class type (`java.lang` names are simple).
    pub fn raw_name(&self) -> Option<&str> {
        match self {
            JavaType::Class { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Unqualified name of a class type.
    pub fn simple_name(&self) -> Option<&str> {
        self.raw_name()
            .map(|name| name.rsplit('.').next().unwrap_or(name))
    }

    pub fn type_args(&self) -> &[JavaType] {
        match self {
            JavaType::Class { args, .. } => args,
            _ => &[],
        }
    }

    pub fn type_arg(&self, index: usize) -> Option<&JavaType> {
        self.type_args().get(index)
    }

    pub fn array_component(&self) -> Option<&JavaType> {
        match self {
            JavaType::Array(component) => Some(component),
            _ => None,
        }
    }

    /// Wrapper type for primitives, the type itself otherwise.
    pub fn boxed(&self) -> JavaType {
        match self {
            JavaType::Primitive(p) => JavaType::class(p.boxed_name()),
            other => other.clone(),
        }
    }

    /// Primitive behind a primitive or wrapper type.
    pub fn unboxed(&self) -> Option<PrimitiveType> {
        match self {
            JavaType::Primitive(p) => Some(*p),
            JavaType::Class { name, args } if args.is_empty() => PrimitiveType::from_boxed(name),
            _ => None,
        }
    }

    /// Zero value for a variable of this type.
    pub fn default_value(&self) -> &'static str {
        match self {
            JavaType::Primitive(p) => p.default_value(),
            _ => "null",
        }
    }

    /// Whether this is one of the four stream interfaces.
    pub fn is_stream(&self) -> bool {
        matches!(
            self.simple_name(),
            Some("Stream" | "IntStream" | "LongStream" | "DoubleStream")
        ) && self
            .raw_name()
            .is_some_and(|name| name.starts_with("java.util.stream.") || !name.contains('.'))
    }

    /// Element type of a stream type.
    pub fn stream_element(&self) -> Option<JavaType> {
        if !self.is_stream() {
            return None;
        }
        match self.simple_name()? {
            "IntStream" => Some(JavaType::INT),
            "LongStream" => Some(JavaType::LONG),
            "DoubleStream" => Some(JavaType::DOUBLE),
            _ => Some(
                self.type_arg(0)
                    .map_or_else(JavaType::object, JavaType::eliminate_wildcards),
            ),
        }
    }

    /// Element type of an optional type.
    pub fn optional_element(&self) -> Option<JavaType> {
        match self.raw_name()? {
            "java.util.OptionalInt" => Some(JavaType::INT),
            "java.util.OptionalLong" => Some(JavaType::LONG),
            "java.util.OptionalDouble" => Some(JavaType::DOUBLE),
            "java.util.Optional" => Some(
                self.type_arg(0)
                    .map_or_else(JavaType::object, JavaType::eliminate_wildcards),
            ),
            _ => None,
        }
    }

    /// Whether a value of this type has a `stream()` method yielding its elements.
    pub fn is_collection_like(&self) -> bool {
        matches!(
            self.simple_name(),
            Some(
                "Collection"
                    | "List"
                    | "Set"
                    | "SortedSet"
                    | "NavigableSet"
                    | "Queue"
                    | "Deque"
                    | "ArrayList"
                    | "LinkedList"
                    | "ArrayDeque"
                    | "HashSet"
                    | "LinkedHashSet"
                    | "TreeSet"
                    | "CopyOnWriteArrayList"
            )
        )
    }

    /// Whether `new T[n]` is legal for this component type.
    pub fn is_reifiable(&self) -> bool {
        match self {
            JavaType::Primitive(_) => true,
            JavaType::Class { name, args } => args.is_empty() && !is_type_variable(name),
            JavaType::Array(component) => component.is_reifiable(),
            JavaType::Void | JavaType::Wildcard(_) | JavaType::Null => false,
        }
    }

    /// Replace wildcards by their bound (`Object` when unbounded), recursively.
    #[must_use]
    pub fn eliminate_wildcards(&self) -> JavaType {
        match self {
            JavaType::Wildcard(WildcardBound::Unbounded) => JavaType::object(),
            JavaType::Wildcard(WildcardBound::Extends(bound) | WildcardBound::Super(bound)) => {
                bound.eliminate_wildcards()
            }
            JavaType::Class { name, args } => JavaType::Class {
                name: name.clone(),
                args: args.iter().map(JavaType::eliminate_wildcards).collect(),
            },
            JavaType::Array(component) => JavaType::array(component.eliminate_wildcards()),
            other => other.clone(),
        }
    }

    /// Replace an outermost wildcard by its bound (`Object` when
    /// unbounded). Type arguments of the bound are left alone.
    #[must_use]
    pub fn eliminate_outer_wildcard(&self) -> JavaType {
        match self {
            JavaType::Wildcard(WildcardBound::Unbounded) => JavaType::object(),
            JavaType::Wildcard(WildcardBound::Extends(bound) | WildcardBound::Super(bound)) => {
                bound.eliminate_outer_wildcard()
            }
            other => other.clone(),
        }
    }

    /// Same class ignoring type arguments.
    pub fn same_erasure(&self, other: &JavaType) -> bool {
        match (self, other) {
            (JavaType::Class { name: a, .. }, JavaType::Class { name: b, .. }) => a == b,
            (JavaType::Array(a), JavaType::Array(b)) => a.same_erasure(b),
            _ => self == other,
        }
    }
}

/// Single upper-case identifiers such as `T` or `E` are treated as type variables.
fn is_type_variable(name: &str) -> bool {
    !name.contains('.')
        && name.len() <= 2
        && name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JavaType::Primitive(p) => f.write_str(p.keyword()),
            JavaType::Void => f.write_str("void"),
            JavaType::Null => f.write_str("null"),
            JavaType::Class { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            JavaType::Array(component) => write!(f, "{component}[]"),
            JavaType::Wildcard(WildcardBound::Unbounded) => f.write_str("?"),
            JavaType::Wildcard(WildcardBound::Extends(bound)) => write!(f, "? extends {bound}"),
            JavaType::Wildcard(WildcardBound::Super(bound)) => write!(f, "? super {bound}"),
        }
    }
}

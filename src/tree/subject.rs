use std::any::TypeId;
use std::fmt;

/// A handle to the type a group describes.
///
/// The engine never instantiates or extends the subject; it only needs its identity and a
/// display name for the group's name.
///
/// ```rust
/// use arbor::Subject;
/// struct Pony;
/// assert_eq!(Subject::of::<Pony>().name(), "Pony");
/// assert_eq!(Subject::of::<Vec<String>>().name(), "Vec<String>");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Subject {
    type_id: TypeId,
    type_name: &'static str,
}

impl Subject {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The type name with module paths stripped.
    pub fn name(&self) -> String {
        short_type_name(self.type_name)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for Subject {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for Subject {}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn short_type_name(full: &str) -> String {
    fn flush(out: &mut String, path: &mut String) {
        out.push_str(path.rsplit("::").next().unwrap_or_default());
        path.clear();
    }

    let mut out = String::with_capacity(full.len());
    let mut path = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            path.push(c);
        } else {
            flush(&mut out, &mut path);
            out.push(c);
        }
    }
    flush(&mut out, &mut path);
    out
}

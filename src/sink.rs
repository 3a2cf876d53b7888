//! Typed field output.
//!
//! Decoders hand values to a [`FieldSink`] without formatting them for
//! display beyond what the value itself is (a version string, a CS:IP pair).
//! [`FieldList`] records everything it is given.

/// Radix hint for numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Base {
    Dec,
    Hex,
}

/// Consumer of emitted fields.
///
/// Fields belong to the most recently opened tab; fields emitted before
/// the first [`FieldSink::tab`] call belong to an unnamed leading tab.
pub trait FieldSink {
    /// Start a new tab.
    fn tab(&mut self, name: &str);

    fn string(&mut self, name: &str, value: &str);

    /// Integer value; `digits` is a minimum width hint for hex output.
    fn numeric(&mut self, name: &str, value: u64, base: Base, digits: u8);

    /// Flag word with one optional name per bit, starting at bit 0.
    fn bitfield(&mut self, name: &str, value: u32, bit_names: &[Option<&str>]);

    /// Table with column headers.
    fn list(&mut self, name: &str, columns: &[&str], rows: Vec<Vec<String>>);

    fn hexdump(&mut self, name: &str, data: &[u8]);

    /// Seconds since the Unix epoch, UTC.
    fn datetime(&mut self, name: &str, unix_time: i64);

    fn warning(&mut self, message: &str);
}

/// A recorded field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    String(String),
    Numeric {
        value: u64,
        base: Base,
        digits: u8,
    },
    Bitfield {
        value: u32,
        bit_names: Vec<Option<String>>,
    },
    List {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    HexDump(Vec<u8>),
    DateTime(i64),
    Warning(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) | FieldValue::Warning(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Numeric { value, .. } => Some(*value),
            FieldValue::Bitfield { value, .. } => Some(u64::from(*value)),
            _ => None,
        }
    }

    pub fn rows(&self) -> Option<&[Vec<String>]> {
        match self {
            FieldValue::List { rows, .. } => Some(rows),
            _ => None,
        }
    }

    /// Names of the set bits of a bitfield, in bit order.
    pub fn set_bits(&self) -> Vec<&str> {
        match self {
            FieldValue::Bitfield { value, bit_names } => bit_names
                .iter()
                .enumerate()
                .filter(|(bit, _)| *bit < 32 && (*value >> *bit) & 1 != 0)
                .filter_map(|(_, name)| name.as_deref())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// One recorded field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Index into [`FieldList::tabs`].
    pub tab: usize,
    pub name: String,
    pub value: FieldValue,
}

/// Recording sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldList {
    tabs: Vec<String>,
    fields: Vec<Field>,
}

impl Default for FieldList {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldList {
    pub fn new() -> Self {
        Self {
            tabs: vec![String::new()],
            fields: Vec::new(),
        }
    }

    /// Tab names; the first is the unnamed leading tab unless a tab was
    /// opened before any field was emitted.
    pub fn tabs(&self) -> &[String] {
        &self.tabs
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// First field called `name` in any tab.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// First field called `name` in the first tab called `tab`.
    pub fn get_in(&self, tab: &str, name: &str) -> Option<&FieldValue> {
        let index = self.tabs.iter().position(|t| t == tab)?;
        self.fields
            .iter()
            .find(|f| f.tab == index && f.name == name)
            .map(|f| &f.value)
    }

    /// String value of the first field called `name`.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    /// Field names in emission order.
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    fn push(&mut self, name: &str, value: FieldValue) {
        self.fields.push(Field {
            tab: self.tabs.len() - 1,
            name: name.to_string(),
            value,
        });
    }
}

impl FieldSink for FieldList {
    fn tab(&mut self, name: &str) {
        // An empty leading tab is renamed rather than left behind.
        if self.fields.is_empty() && self.tabs.len() == 1 && self.tabs[0].is_empty() {
            self.tabs[0] = name.to_string();
        } else {
            self.tabs.push(name.to_string());
        }
    }

    fn string(&mut self, name: &str, value: &str) {
        self.push(name, FieldValue::String(value.to_string()));
    }

    fn numeric(&mut self, name: &str, value: u64, base: Base, digits: u8) {
        self.push(name, FieldValue::Numeric { value, base, digits });
    }

    fn bitfield(&mut self, name: &str, value: u32, bit_names: &[Option<&str>]) {
        let bit_names = bit_names.iter().map(|n| n.map(str::to_string)).collect();
        self.push(name, FieldValue::Bitfield { value, bit_names });
    }

    fn list(&mut self, name: &str, columns: &[&str], rows: Vec<Vec<String>>) {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.push(name, FieldValue::List { columns, rows });
    }

    fn hexdump(&mut self, name: &str, data: &[u8]) {
        self.push(name, FieldValue::HexDump(data.to_vec()));
    }

    fn datetime(&mut self, name: &str, unix_time: i64) {
        self.push(name, FieldValue::DateTime(unix_time));
    }

    fn warning(&mut self, message: &str) {
        self.push("Warning", FieldValue::Warning(message.to_string()));
    }
}

//! # exeinfo
//!
//! Read-only introspection of executable containers: DOS MZ, 16-bit NE,
//! LE/LX, PE/PE32+ and ELF.
//!
//! The library detects the container format, decodes the headers, and
//! walks the auxiliary structures (sections and program headers, resource
//! directories, version info, imports and exports, ELF dynamic sections,
//! symbol tables and notes). Nothing is ever executed, relocated or
//! modified, and every read is bounds-checked against the file.
//!
//! ## Features
//!
//! - **Format detection**: [`detect`] works on any [`Reader`] without
//!   decoding more than the headers it needs.
//! - **Sessions**: [`Executable`] owns the reader, decodes the primary
//!   headers on open and reads everything else lazily.
//! - **Field output**: [`Executable::emit_fields`] feeds descriptive fields
//!   to any [`FieldSink`]; [`FieldList`] records them.
//! - **Sanity limits**: [`Limits`] caps every table walk and allocation.
//!
//! ## Example
//!
//! ```no_run
//! use exeinfo::{Executable, FieldList, SystemNameKind};
//!
//! let exe = Executable::from_file("example.exe").unwrap();
//! println!("{} for {}", exe.format_name(), exe.system_name(SystemNameKind::Long));
//!
//! if let Some(version) = exe.version_info() {
//!     println!("File version: {}", version.fixed.file_version());
//! }
//!
//! let mut fields = FieldList::new();
//! exe.emit_fields(&mut fields);
//! for field in fields.fields() {
//!     println!("{}: {:?}", field.name, field.value);
//! }
//! ```

pub mod codepage;
pub mod coff;
pub mod cpu;
pub mod data_dir;
pub mod detect;
pub mod dos;
pub mod dynamic;
pub mod elf;
pub mod elf_flags;
pub mod endian;
pub mod error;
pub mod executable;
pub mod export;
pub mod import;
pub mod le;
pub mod limits;
pub mod ne;
pub mod ne_entry;
pub mod ne_import;
pub mod ne_resource;
pub mod note;
pub mod optional;
pub mod pe;
pub mod pe_resource;
pub mod reader;
pub mod resource;
pub mod runtime;
pub mod section;
pub mod sink;
pub mod symbol;
pub mod version;

pub use detect::{detect, ContainerFormat};
pub use endian::Endian;
pub use error::{Error, ErrorKind, Result};
pub use executable::{
    ElfInfo, Executable, ExecutableHeader, FileKind, Header, Linkage, SymbolTable, SystemNameKind,
};
pub use export::{ExportAddress, ExportEntry};
pub use import::{ImportEntry, ImportSymbol};
pub use limits::Limits;
pub use ne_entry::NeEntry;
pub use reader::{FileReader, Reader, SliceReader, VecReader};
pub use resource::{ResourceRange, ResourceReader, ResourceType};
pub use runtime::RuntimeDll;
pub use sink::{Base, Field, FieldList, FieldSink, FieldValue};
pub use symbol::Symbol;
pub use version::{FixedFileInfo, VersionInfo};

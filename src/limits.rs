//! Sanity ceilings applied while walking attacker-controlled tables.

/// Upper bounds on counts and sizes the decoders will accept.
///
/// Formats often allow far larger values than any real file uses; these
/// ceilings keep a hostile file from driving unbounded allocation or work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of PE section headers.
    pub max_pe_sections: usize,
    /// Maximum entries accepted from one resource directory.
    pub max_resource_entries: usize,
    /// Maximum directory and leaf nodes visited by one resource lookup.
    pub max_resource_nodes: usize,
    /// Largest file a PE resource reader will operate on.
    pub max_pe_resource_file_size: u64,
    /// Largest file an NE resource reader will operate on.
    pub max_ne_file_size: u64,
    /// Largest PE import directory read in one piece.
    pub max_import_directory: u32,
    /// Largest span of import DLL names read in one piece.
    pub max_import_name_span: u32,
    /// Largest NE module-reference plus imported-name block.
    pub max_ne_name_tables: u32,
    /// Largest ELF PT_DYNAMIC segment.
    pub max_elf_dynamic: u64,
    /// Largest ELF string table.
    pub max_elf_strtab: u64,
    /// Largest ELF symbol table.
    pub max_elf_symtab: u64,
    /// Largest ELF note section.
    pub max_elf_note: u64,
    /// Largest ELF PT_INTERP segment.
    pub max_elf_interp: u64,
    /// Maximum exported functions listed from one PE.
    pub max_exports: usize,
    /// Maximum imported functions listed per PE module.
    pub max_imports_per_module: usize,
    /// Maximum distinct imported functions listed from one image.
    pub max_imports: usize,
    /// Maximum PE lookup-table thunks or NE relocation records walked
    /// per image, duplicates included.
    pub max_import_records: usize,
    /// Maximum NE entry-table ordinals.
    pub max_ne_entries: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_pe_sections: 256,
            max_resource_entries: 8192,
            max_resource_nodes: 16384,
            max_pe_resource_file_size: 2 * 1024 * 1024 * 1024,
            max_ne_file_size: 16 * 1024 * 1024,
            max_import_directory: 4 * 1024 * 1024,
            max_import_name_span: 1024 * 1024,
            max_ne_name_tables: 128 * 1024,
            max_elf_dynamic: 1024 * 1024,
            max_elf_strtab: 1024 * 1024,
            max_elf_symtab: 1024 * 1024,
            max_elf_note: 256,
            max_elf_interp: 256,
            max_exports: 65536,
            max_imports_per_module: 65536,
            max_imports: 65536,
            max_import_records: 256 * 1024,
            max_ne_entries: 65535,
        }
    }
}

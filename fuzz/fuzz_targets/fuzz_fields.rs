#![no_main]

use exeinfo::{Executable, FieldList, SliceReader, SymbolTable};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(exe) = Executable::open(SliceReader::new(data)) else {
        return;
    };
    let mut fields = FieldList::new();
    exe.emit_fields(&mut fields);

    // Lazily loaded structures are cached; a second pass must agree.
    let _ = exe.imports();
    let _ = exe.exports();
    let _ = exe.symbols(SymbolTable::Dynsym);
    let mut again = FieldList::new();
    exe.emit_fields(&mut again);
    assert_eq!(fields, again);
});

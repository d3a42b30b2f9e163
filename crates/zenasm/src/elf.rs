//! Minimal ELF64 relocatable object writer for x86-64.
//!
//! The object has a fixed section layout:
//!
//! | index | name        | type       |
//! |-------|-------------|------------|
//! | 0     |             | `NULL`     |
//! | 1     | `.text`     | `PROGBITS` |
//! | 2     | `.shstrtab` | `STRTAB`   |
//! | 3     | `.symtab`   | `SYMTAB`   |
//! | 4     | `.strtab`   | `STRTAB`   |
//!
//! Section headers follow the ELF header directly; section contents follow
//! the header table in index order. No relocations are emitted.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use bytes::{BufMut, BytesMut};
use log::trace;

use crate::symbol::{SymbolKind, SymbolTable};
use section::{SectionHeader, SectionType};
use symbol::{ElfSymbol, SymbolBinding, SymbolType};

/// Index of `.text` in the section header table.
pub const TEXT_INDEX: u16 = 1;
/// Index of `.shstrtab` in the section header table.
pub const SHSTRTAB_INDEX: u16 = 2;
/// Index of `.symtab` in the section header table.
pub const SYMTAB_INDEX: u16 = 3;
/// Index of `.strtab` in the section header table.
pub const STRTAB_INDEX: u16 = 4;

pub mod elf_header {
    pub const EI_MAG: [u8; 4] = *b"\x7FELF";
    pub const EI_VERSION: u8 = 1;
    pub const EI_OSABI: u8 = 0;
    pub const EI_ABIVERSION: u8 = 0;
    pub const EI_PAD: [u8; 7] = [0; 7];

    /// AMD x86-64.
    pub const E_MACHINE: u16 = 0x3E;
    pub const E_VERSION: u32 = 1;

    pub const EI_CLASS_64: u8 = 2;
    pub const EI_DATA_LE: u8 = 1;

    pub const E_EHSIZE: u16 = 64;
    pub const E_PHENTSIZE: u16 = 56;
    pub const E_SHENTSIZE: u16 = 64;
    pub const SYM_ENTSIZE: usize = 24;

    #[repr(u16)]
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum ElfType {
        None = 0x00,
        Rel = 0x01,
    }

    #[derive(Debug)]
    pub struct ElfHeader {
        pub r#type: ElfType,
        pub entry: u64,
        pub phoff: u64,
        pub shoff: u64,
        pub flags: u32,
        pub phnum: u16,
        pub shnum: u16,
        pub shstrndx: u16,
    }
}

pub mod section {
    #[repr(u32)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub enum SectionType {
        /// Section header table entry unused
        #[default]
        Null = 0x0,
        /// Program data
        Progbits = 0x1,
        /// Symbol table
        Symtab = 0x2,
        /// String table
        Strtab = 0x3,
    }

    pub mod section_flags {
        /// Occupies memory during execution
        pub const SHF_ALLOC: u64 = 0x2;
        /// Executable
        pub const SHF_EXECINSTR: u64 = 0x4;
        /// Contains null-terminated strings
        pub const SHF_STRINGS: u64 = 0x20;
    }

    #[derive(Clone, Debug, Default)]
    pub struct SectionHeader {
        pub name: u32,
        pub r#type: SectionType,
        pub flags: u64,
        pub addr: u64,
        pub offset: u64,
        pub size: u64,
        pub link: u32,
        pub info: u32,
        pub addralign: u64,
        pub entsize: u64,
    }
}

pub mod symbol {
    #[derive(Debug, Default)]
    pub struct ElfSymbol {
        pub name: u32,
        pub value: u64,
        pub size: u64,
        pub info: (SymbolType, SymbolBinding),
        pub other: u8,
        pub shndx: u16,
    }

    #[repr(u8)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub enum SymbolType {
        /// The symbol's type is not defined
        #[default]
        NoType = 0,
        /// The symbol is associated with a section.
        Section = 3,
    }

    #[repr(u8)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
    pub enum SymbolBinding {
        /// Not visible outside the object file.
        #[default]
        Local = 0,
        /// Visible to all object files being combined.
        Global = 1,
    }

    impl From<crate::symbol::SymbolKind> for SymbolBinding {
        fn from(kind: crate::symbol::SymbolKind) -> Self {
            match kind {
                crate::symbol::SymbolKind::Normal => Self::Local,
                crate::symbol::SymbolKind::Imported | crate::symbol::SymbolKind::Exported => {
                    Self::Global
                }
            }
        }
    }
}

struct ElfFile {
    sections: Vec<SectionHeader>,
    symbols: Vec<ElfSymbol>,

    shstrtab: Vec<u8>,
    strtab: Vec<u8>,
}

impl ElfFile {
    fn new() -> Self {
        Self {
            sections: vec![SectionHeader::default()],
            symbols: vec![ElfSymbol::default()],
            shstrtab: vec![0],
            strtab: vec![0],
        }
    }

    fn add_section(&mut self, sh: SectionHeader) -> usize {
        self.sections.push(sh);
        self.sections.len() - 1
    }

    fn add_symbol(&mut self, name: &str, mut sym: ElfSymbol) {
        if !name.is_empty() {
            sym.name = self.strtab.len() as u32;
            self.strtab.extend_from_slice(name.as_bytes());
            self.strtab.put_u8(0u8);
        }
        self.symbols.push(sym);
    }

    fn add_section_str(&mut self, s: &str) -> u32 {
        let offset = self.shstrtab.len();
        self.shstrtab.extend_from_slice(s.as_bytes());
        self.shstrtab.put_u8(0u8);
        offset as u32
    }
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Serialize `code` into an ELF64 relocatable object.
///
/// Every imported or exported name in `symbols` becomes a global symbol.
/// Exported names with a matching entry in `labels` are defined in `.text`
/// at that offset; everything else is left undefined for the linker.
pub fn write_object(code: &[u8], labels: &[(String, u64)], symbols: &SymbolTable) -> Vec<u8> {
    let mut elf_file = ElfFile::new();

    elf_file.add_symbol(
        "",
        ElfSymbol {
            info: (SymbolType::Section, SymbolBinding::Local),
            shndx: TEXT_INDEX,
            ..Default::default()
        },
    );

    for sym in symbols.iter().filter(|s| s.kind != SymbolKind::Normal) {
        let defined = match sym.kind {
            SymbolKind::Exported => labels
                .iter()
                .find(|(name, _)| *name == sym.name)
                .map(|(_, offset)| *offset),
            _ => None,
        };
        trace!("elf symbol {} ({:?}) at {:?}", sym.name, sym.kind, defined);
        elf_file.add_symbol(
            &sym.name,
            ElfSymbol {
                value: defined.unwrap_or(0),
                info: (SymbolType::NoType, sym.kind.into()),
                shndx: if defined.is_some() { TEXT_INDEX } else { 0 },
                ..Default::default()
            },
        );
    }

    let first_non_local_symbol = elf_file
        .symbols
        .iter()
        .position(|sym| sym.info.1 != SymbolBinding::Local)
        .unwrap_or(elf_file.symbols.len());

    let text = elf_file.add_section_str(".text");
    elf_file.add_section(SectionHeader {
        name: text,
        r#type: SectionType::Progbits,
        flags: section::section_flags::SHF_ALLOC | section::section_flags::SHF_EXECINSTR,
        size: code.len() as u64,
        addralign: 16,
        ..Default::default()
    });

    let shstrtab = elf_file.add_section_str(".shstrtab");
    let symtab = elf_file.add_section_str(".symtab");
    let strtab = elf_file.add_section_str(".strtab");

    elf_file.add_section(SectionHeader {
        name: shstrtab,
        r#type: SectionType::Strtab,
        flags: section::section_flags::SHF_STRINGS,
        size: elf_file.shstrtab.len() as u64,
        addralign: 1,
        ..Default::default()
    });

    elf_file.add_section(SectionHeader {
        name: symtab,
        r#type: SectionType::Symtab,
        size: (elf_file.symbols.len() * elf_header::SYM_ENTSIZE) as u64,
        link: u32::from(STRTAB_INDEX),
        info: first_non_local_symbol as u32,
        addralign: 8,
        entsize: elf_header::SYM_ENTSIZE as u64,
        ..Default::default()
    });

    elf_file.add_section(SectionHeader {
        name: strtab,
        r#type: SectionType::Strtab,
        flags: section::section_flags::SHF_STRINGS,
        size: elf_file.strtab.len() as u64,
        addralign: 1,
        ..Default::default()
    });

    let mut data_offset = elf_header::E_EHSIZE as usize
        + elf_file.sections.len() * elf_header::E_SHENTSIZE as usize;

    for section in elf_file.sections.iter_mut() {
        if section.r#type == SectionType::Null {
            continue;
        }
        data_offset = align_up(data_offset, section.addralign.max(1) as usize);
        section.offset = data_offset as u64;
        data_offset += section.size as usize;
    }

    let header = elf_header::ElfHeader {
        r#type: elf_header::ElfType::Rel,
        entry: 0,
        phoff: 0,
        shoff: u64::from(elf_header::E_EHSIZE),
        flags: 0,
        phnum: 0,
        shnum: elf_file.sections.len() as u16,
        shstrndx: SHSTRTAB_INDEX,
    };

    let mut buf = BytesMut::with_capacity(data_offset);
    write_elf_header(&mut buf, &header);

    for section in &elf_file.sections {
        write_section_header(&mut buf, section);
    }

    let symtab_offset = elf_file.sections[usize::from(SYMTAB_INDEX)].offset as usize;

    buf.put_slice(code);
    buf.put_slice(&elf_file.shstrtab);
    buf.put_bytes(0, symtab_offset - buf.len());
    for sym in &elf_file.symbols {
        write_symbol(&mut buf, sym);
    }
    buf.put_slice(&elf_file.strtab);

    debug_assert_eq!(buf.len(), data_offset);
    buf.to_vec()
}

fn write_elf_header(bytes: &mut BytesMut, elf_header: &elf_header::ElfHeader) {
    bytes.put_slice(&elf_header::EI_MAG);
    bytes.put_u8(elf_header::EI_CLASS_64);
    bytes.put_u8(elf_header::EI_DATA_LE);
    bytes.put_u8(elf_header::EI_VERSION);
    bytes.put_u8(elf_header::EI_OSABI);
    bytes.put_u8(elf_header::EI_ABIVERSION);
    bytes.put_slice(&elf_header::EI_PAD);

    bytes.put_u16_le(elf_header.r#type as u16);
    bytes.put_u16_le(elf_header::E_MACHINE);
    bytes.put_u32_le(elf_header::E_VERSION);

    bytes.put_u64_le(elf_header.entry);
    bytes.put_u64_le(elf_header.phoff);
    bytes.put_u64_le(elf_header.shoff);

    bytes.put_u32_le(elf_header.flags);
    bytes.put_u16_le(elf_header::E_EHSIZE);
    bytes.put_u16_le(elf_header::E_PHENTSIZE);
    bytes.put_u16_le(elf_header.phnum);
    bytes.put_u16_le(elf_header::E_SHENTSIZE);
    bytes.put_u16_le(elf_header.shnum);
    bytes.put_u16_le(elf_header.shstrndx);
}

fn write_section_header(bytes: &mut BytesMut, sh: &SectionHeader) {
    bytes.put_u32_le(sh.name);
    bytes.put_u32_le(sh.r#type as u32);

    bytes.put_u64_le(sh.flags);
    bytes.put_u64_le(sh.addr);
    bytes.put_u64_le(sh.offset);
    bytes.put_u64_le(sh.size);

    bytes.put_u32_le(sh.link);
    bytes.put_u32_le(sh.info);

    bytes.put_u64_le(sh.addralign);
    bytes.put_u64_le(sh.entsize);
}

fn write_symbol(bytes: &mut BytesMut, sym: &ElfSymbol) {
    bytes.put_u32_le(sym.name);

    let info = {
        let bind = (sym.info.1 as u8) << 4;
        let r#type = (sym.info.0 as u8) & 0xF;
        bind | r#type
    };

    bytes.put_u8(info);
    bytes.put_u8(sym.other);
    bytes.put_u16_le(sym.shndx);
    bytes.put_u64_le(sym.value);
    bytes.put_u64_le(sym.size);
}

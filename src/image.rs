//! The loaded-image view consumed by the optimizer.
//!
//! Parsing executable formats happens elsewhere; an [`Image`] only carries what the passes
//! need: the raw bytes as they would be mapped in memory, the base address, and RVA-sorted
//! section and symbol tables. The builder methods keep both tables sorted so lookups can
//! binary search.

/// A mapped section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Section {
    /// First RVA covered
    pub rva: u64,
    /// RVA past the end
    pub rva_end: u64,
    /// Section name
    pub name: String,
    /// Memory is writable at runtime
    pub writable: bool,
    /// Memory is executable
    pub executable: bool,
}

impl Section {
    /// Creates a read-only, non-executable section.
    #[must_use]
    pub fn new(name: &str, rva: u64, rva_end: u64) -> Self {
        Section {
            rva,
            rva_end,
            name: name.to_string(),
            writable: false,
            executable: false,
        }
    }

    /// Marks the section writable.
    #[must_use]
    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    /// Marks the section executable.
    #[must_use]
    pub fn executable(mut self) -> Self {
        self.executable = true;
        self
    }

    /// `true` if `rva` lies inside the section.
    #[must_use]
    pub fn contains(&self, rva: u64) -> bool {
        self.rva <= rva && rva < self.rva_end
    }
}

/// A named location in the image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Symbol {
    /// RVA of the symbol
    pub rva: u64,
    /// Symbol name
    pub name: String,
    /// The loader may patch the value, so it must not be treated as constant even if it lives
    /// in a read-only section.
    pub read_only_ignore: bool,
}

impl Symbol {
    /// Creates a symbol.
    #[must_use]
    pub fn new(name: &str, rva: u64, read_only_ignore: bool) -> Self {
        Symbol {
            rva,
            name: name.to_string(),
            read_only_ignore,
        }
    }
}

/// Inserts `value` keeping `set` sorted by RVA.
fn insert_sorted<T>(set: &mut Vec<T>, value: T, rva: impl Fn(&T) -> u64) {
    let key = rva(&value);
    let position = set.partition_point(|entry| rva(entry) < key);
    set.insert(position, value);
}

/// A binary image as mapped into memory.
#[derive(Debug, Clone, Default)]
pub struct Image {
    name: String,
    base_address: u64,
    raw_data: Vec<u8>,
    sections: Vec<Section>,
    symbols: Vec<Symbol>,
    entry_points: Vec<u64>,
}

impl Image {
    /// Creates an image from its mapped bytes, indexed by RVA.
    #[must_use]
    pub fn new(base_address: u64, raw_data: Vec<u8>) -> Self {
        Image {
            base_address,
            raw_data,
            ..Image::default()
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Preferred load address.
    #[must_use]
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// The mapped bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.raw_data
    }

    /// Adds a section, keeping the table sorted.
    pub fn add_section(&mut self, section: Section) {
        insert_sorted(&mut self.sections, section, |s| s.rva);
    }

    /// Adds a symbol, keeping the table sorted.
    pub fn add_symbol(&mut self, symbol: Symbol) {
        insert_sorted(&mut self.symbols, symbol, |s| s.rva);
    }

    /// Adds an entry point; the first one added is the main entry.
    pub fn add_entry_point(&mut self, rva: u64) {
        self.entry_points.push(rva);
    }

    /// Sections sorted by RVA.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Symbols sorted by RVA.
    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Entry point RVAs in insertion order.
    #[must_use]
    pub fn entry_points(&self) -> &[u64] {
        &self.entry_points
    }

    /// The section containing `rva`.
    #[must_use]
    pub fn find_section(&self, rva: u64) -> Option<&Section> {
        let position = self.sections.partition_point(|s| s.rva <= rva);
        let section = self.sections.get(position.checked_sub(1)?)?;
        section.contains(rva).then_some(section)
    }

    /// The symbol starting exactly at `rva`.
    #[must_use]
    pub fn find_symbol(&self, rva: u64) -> Option<&Symbol> {
        let position = self.symbols.partition_point(|s| s.rva < rva);
        self.symbols.get(position).filter(|s| s.rva == rva)
    }

    /// `true` if any byte in `rva..rva + len` starts a symbol the loader may rewrite.
    #[must_use]
    pub fn is_read_only_ignored(&self, rva: u64, len: usize) -> bool {
        let end = rva.saturating_add(len as u64);
        let start = self.symbols.partition_point(|s| s.rva < rva);
        self.symbols[start..]
            .iter()
            .take_while(|s| s.rva < end)
            .any(|s| s.read_only_ignore)
    }

    /// The bytes from `rva` to the end of the image; empty when out of bounds.
    #[must_use]
    pub fn slice(&self, rva: u64) -> &[u8] {
        usize::try_from(rva)
            .ok()
            .and_then(|start| self.raw_data.get(start..))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Image {
        let mut image = Image::new(0x1000_0000, (0..=0xFFu8).collect()).with_name("sample");
        image.add_section(Section::new(".data", 0x80, 0xC0).writable());
        image.add_section(Section::new(".text", 0x00, 0x40).executable());
        image.add_section(Section::new(".rdata", 0x40, 0x80));
        image.add_symbol(Symbol::new("iat", 0x48, true));
        image.add_symbol(Symbol::new("table", 0x40, false));
        image
    }

    #[test]
    fn test_tables_sorted() {
        let image = sample();
        let rvas: Vec<u64> = image.sections().iter().map(|s| s.rva).collect();
        assert_eq!(rvas, vec![0x00, 0x40, 0x80]);
        assert_eq!(image.symbols()[0].name, "table");
        assert_eq!(image.name(), "sample");
    }

    #[test]
    fn test_find_section() {
        let image = sample();
        assert_eq!(image.find_section(0x00).unwrap().name, ".text");
        assert_eq!(image.find_section(0x3F).unwrap().name, ".text");
        assert_eq!(image.find_section(0x40).unwrap().name, ".rdata");
        assert!(image.find_section(0x90).unwrap().writable);
        assert!(image.find_section(0xC0).is_none());
        assert!(image.find_section(u64::MAX).is_none());
    }

    #[test]
    fn test_symbols() {
        let image = sample();
        assert_eq!(image.find_symbol(0x48).unwrap().name, "iat");
        assert!(image.find_symbol(0x49).is_none());

        assert!(image.is_read_only_ignored(0x44, 8));
        assert!(image.is_read_only_ignored(0x48, 1));
        assert!(!image.is_read_only_ignored(0x40, 8));
        assert!(!image.is_read_only_ignored(0x49, 8));
    }

    #[test]
    fn test_slice() {
        let image = sample();
        assert_eq!(&image.slice(0xFE)[..], &[0xFE, 0xFF]);
        assert!(image.slice(0x100).is_empty());
        assert!(image.slice(0x1000).is_empty());
    }
}

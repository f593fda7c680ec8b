use std::collections::HashMap;

use tracing::debug;

use crate::ast::{Label, LabelMap, SectionId, Stmt};
use crate::encode;
use crate::error::AsmError;
use crate::reduce;
use crate::token::Kind;

/// "ulp" plus a NUL, as the loader expects it, little-endian.
const MAGIC: u32 = 0x0070_6C75;
const HEADER_LEN: usize = 12;

#[derive(Debug, Default, Clone)]
pub struct Section {
    pub size: usize,
    pub bytes: Vec<u8>,
    pub offset: usize,
}

impl Section {
    fn validate(&self, name: &str) -> Result<(), AsmError> {
        if self.size != self.bytes.len() {
            return Err(AsmError::Internal(format!(
                "section {} emitted {} bytes but was sized {}",
                name,
                self.bytes.len(),
                self.size
            )));
        }
        Ok(())
    }
}

/// Three walks over the statement list: size the sections and collect
/// labels, place the sections and resolve every label to a byte offset,
/// then emit bytes with the location label `.` rebound per statement.
#[derive(Debug, Default)]
pub struct Compiler {
    program: Vec<Stmt>,
    pub labels: LabelMap,
    pre_labels: HashMap<String, usize>,
    pub boot: Section,
    pub boot_data: Section,
    pub text: Section,
    pub data: Section,
    pub bss: Section,
    pub stack: Section,
    current: SectionId,
}

impl Compiler {
    pub fn compile_to_bin(
        &mut self,
        program: Vec<Stmt>,
        reserved_bytes: usize,
        reduce: bool,
    ) -> Result<Vec<u8>, AsmError> {
        self.compile(program, reserved_bytes, reduce)?;
        Ok(self.build_binary())
    }

    pub fn compile_to_asm(
        &mut self,
        program: Vec<Stmt>,
        reserved_bytes: usize,
        reduce: bool,
    ) -> Result<String, AsmError> {
        self.compile(program, reserved_bytes, reduce)?;
        Ok(self.build_listing())
    }

    /// Section size summary, e.g. for `--size` output. The stack line is
    /// omitted while the stack is unsized (as in overflow reports).
    pub fn format_sections(&self) -> String {
        let stack = if self.stack.size != 0 {
            format!(" .stack={}", self.stack.size)
        } else {
            String::new()
        };
        let total = self.boot.size
            + self.boot_data.size
            + self.text.size
            + self.data.size
            + self.bss.size
            + self.stack.size;
        format!(
            ".boot={} .boot.data={} .text={} .data={} .bss={}{} total={}",
            self.boot.size, self.boot_data.size, self.text.size, self.data.size, self.bss.size, stack, total
        )
    }

    fn compile(
        &mut self,
        mut program: Vec<Stmt>,
        reserved_bytes: usize,
        reduce_tails: bool,
    ) -> Result<(), AsmError> {
        if reduce_tails {
            reduce::reduce(&mut program);
        }
        self.program = program;
        self.gen_pre_labels();
        self.gen_labels(reserved_bytes)?;
        self.gen_globals()?;
        self.encode_all()?;
        self.validate_sections()?;
        debug!(sections = %self.format_sections(), "assembled");
        Ok(())
    }

    fn section_ref(&self, id: SectionId) -> &Section {
        match id {
            SectionId::Boot => &self.boot,
            SectionId::Text => &self.text,
            SectionId::BootData => &self.boot_data,
            SectionId::Data => &self.data,
            SectionId::Bss => &self.bss,
            SectionId::Stack => &self.stack,
        }
    }

    fn section_mut(&mut self, id: SectionId) -> &mut Section {
        match id {
            SectionId::Boot => &mut self.boot,
            SectionId::Text => &mut self.text,
            SectionId::BootData => &mut self.boot_data,
            SectionId::Data => &mut self.data,
            SectionId::Bss => &mut self.bss,
            SectionId::Stack => &mut self.stack,
        }
    }

    fn section_for(kind: Kind) -> Option<SectionId> {
        match kind {
            Kind::Boot => Some(SectionId::Boot),
            Kind::Text => Some(SectionId::Text),
            Kind::BootData => Some(SectionId::BootData),
            Kind::Data => Some(SectionId::Data),
            Kind::Bss => Some(SectionId::Bss),
            _ => None,
        }
    }

    /// First walk: accumulate section sizes and remember every label's
    /// section-local byte offset.
    fn gen_pre_labels(&mut self) {
        self.current = SectionId::Text;
        let program = std::mem::take(&mut self.program);
        for stmt in &program {
            self.section_mut(self.current).size += stmt.size();
            match stmt {
                Stmt::Directive(t) => {
                    if let Some(id) = Self::section_for(t.kind) {
                        self.current = id;
                    }
                }
                Stmt::Label(t) => {
                    let offset = self.section_ref(self.current).size;
                    self.pre_labels.insert(t.lexeme.clone(), offset);
                    self.labels.insert(
                        t.lexeme.clone(),
                        Label {
                            name: t.lexeme.clone(),
                            value: 0,
                            global: false,
                            section: self.current,
                        },
                    );
                }
                _ => {}
            }
        }
        self.program = program;
    }

    /// Second walk output: place the sections in their fixed order, size
    /// the stack from what remains, resolve labels to byte offsets and
    /// install the synthetic section bound labels.
    fn gen_labels(&mut self, reserved_bytes: usize) -> Result<(), AsmError> {
        self.boot.offset = 0;
        self.text.offset = self.boot.offset + self.boot.size;
        self.boot_data.offset = self.text.offset + self.text.size;
        self.data.offset = self.boot_data.offset + self.boot_data.size;
        self.bss.offset = self.data.offset + self.data.size;
        self.stack.offset = self.bss.offset + self.bss.size;
        if reserved_bytes < self.stack.offset {
            return Err(AsmError::Overflow {
                reserved: reserved_bytes,
                sections: self.format_sections(),
            });
        }
        self.stack.size = reserved_bytes - self.stack.offset;

        let mut resolved = Vec::with_capacity(self.pre_labels.len());
        for (name, offset) in &self.pre_labels {
            if let Some(label) = self.labels.get(name) {
                let value = (self.section_ref(label.section).offset + offset) as i64;
                resolved.push((name.clone(), value));
            }
        }
        for (name, value) in resolved {
            if let Some(label) = self.labels.get_mut(&name) {
                label.value = value;
            }
        }

        self.install_bounds("boot", SectionId::Boot);
        self.install_bounds("text", SectionId::Text);
        self.install_bounds("boot_data", SectionId::BootData);
        self.install_bounds("data", SectionId::Data);
        self.install_bounds("bss", SectionId::Bss);
        self.install_bounds("stack", SectionId::Stack);
        Ok(())
    }

    fn install_bounds(&mut self, name: &str, id: SectionId) {
        let section = self.section_ref(id);
        let bounds = [
            (format!("__{name}_start"), section.offset as i64),
            (format!("__{name}_end"), (section.offset + section.size) as i64),
        ];
        for (name, value) in bounds {
            self.labels.insert(
                name.clone(),
                Label {
                    name,
                    value,
                    global: false,
                    section: id,
                },
            );
        }
    }

    fn gen_globals(&mut self) -> Result<(), AsmError> {
        for stmt in &self.program {
            if let Stmt::Global(t) = stmt {
                match self.labels.get_mut(&t.lexeme) {
                    Some(label) => label.global = true,
                    None => {
                        return Err(AsmError::UnknownGlobal {
                            pos: t.pos.clone(),
                            name: t.lexeme.clone(),
                        })
                    }
                }
            }
        }
        Ok(())
    }

    /// Third walk: emit bytes into the current section, rebinding `.` to
    /// the emit address before every statement. Encoding fails fast.
    fn encode_all(&mut self) -> Result<(), AsmError> {
        self.boot.bytes.clear();
        self.text.bytes.clear();
        self.boot_data.bytes.clear();
        self.data.bytes.clear();
        self.bss.bytes.clear();
        self.current = SectionId::Text;
        let program = std::mem::take(&mut self.program);
        let mut result = Ok(());
        for stmt in &program {
            if let Stmt::Directive(t) = stmt {
                if let Some(id) = Self::section_for(t.kind) {
                    self.current = id;
                }
            }
            let here = {
                let section = self.section_ref(self.current);
                (section.offset + section.bytes.len()) as i64
            };
            self.labels.insert(
                ".".into(),
                Label {
                    name: ".".into(),
                    value: here,
                    global: false,
                    section: self.current,
                },
            );
            match self.emit(stmt) {
                Ok(bytes) => self.section_mut(self.current).bytes.extend_from_slice(&bytes),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        self.program = program;
        result
    }

    fn emit(&self, stmt: &Stmt) -> Result<Vec<u8>, AsmError> {
        match stmt {
            Stmt::Directive(_) | Stmt::Global(_) | Stmt::Label(_) => Ok(Vec::new()),
            Stmt::Words(exprs) => {
                let mut out = Vec::with_capacity(exprs.len() * 4);
                for e in exprs {
                    let value = e.eval(&self.labels)?;
                    out.extend_from_slice(&(value as u32).to_le_bytes());
                }
                Ok(out)
            }
            Stmt::Instr(instr) => encode::encode_instr(instr, &self.labels),
        }
    }

    fn validate_sections(&self) -> Result<(), AsmError> {
        let mut errors = Vec::new();
        let named = [
            (".boot", &self.boot),
            (".text", &self.text),
            (".boot.data", &self.boot_data),
            (".data", &self.data),
            (".bss", &self.bss),
        ];
        for (name, section) in named {
            if let Err(e) = section.validate(name) {
                errors.push(e);
            }
        }
        if self.bss.bytes.iter().any(|b| *b != 0) {
            errors.push(AsmError::Internal(
                ".bss section contains non-zero data".into(),
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AsmError::many("invalid sections", errors))
        }
    }

    /// Final artifact: 12-byte header, then boot, text, boot.data and data
    /// bytes. The bss and stack sections only contribute size metadata.
    fn build_binary(&self) -> Vec<u8> {
        let text_size = self.boot.size + self.text.size;
        let data_size = self.boot_data.size + self.data.size;
        let bss_size = self.bss.size + self.stack.size;
        let mut b = Vec::with_capacity(HEADER_LEN + text_size + data_size);
        b.extend_from_slice(&MAGIC.to_le_bytes());
        b.extend_from_slice(&(HEADER_LEN as u16).to_le_bytes());
        b.extend_from_slice(&(text_size as u16).to_le_bytes());
        b.extend_from_slice(&(data_size as u16).to_le_bytes());
        b.extend_from_slice(&(bss_size as u16).to_le_bytes());
        b.extend_from_slice(&self.boot.bytes);
        b.extend_from_slice(&self.text.bytes);
        b.extend_from_slice(&self.boot_data.bytes);
        b.extend_from_slice(&self.data.bytes);
        b
    }

    /// Textual rendition of the image: one `.byte` line per byte with
    /// label definitions interleaved at their addresses.
    fn build_listing(&self) -> String {
        let mut by_addr: HashMap<i64, Vec<&Label>> = HashMap::new();
        for label in self.labels.values() {
            if label.name == "." {
                continue;
            }
            by_addr.entry(label.value).or_default().push(label);
        }
        for labels in by_addr.values_mut() {
            labels.sort_by(|a, b| a.name.cmp(&b.name));
        }

        let mut s = String::from(".text\n");
        let mut start = 0;
        let mut bytes = Vec::with_capacity(self.boot.size + self.text.size);
        bytes.extend_from_slice(&self.boot.bytes);
        bytes.extend_from_slice(&self.text.bytes);
        push_listing(&mut s, start, &bytes, &by_addr);
        start += bytes.len();

        s.push_str(".data\n");
        let mut bytes = Vec::with_capacity(self.boot_data.size + self.data.size);
        bytes.extend_from_slice(&self.boot_data.bytes);
        bytes.extend_from_slice(&self.data.bytes);
        push_listing(&mut s, start, &bytes, &by_addr);
        start += bytes.len();

        s.push_str(".bss\n");
        push_listing(&mut s, start, &self.bss.bytes, &by_addr);
        s.push_str(&format!(".skip {}", self.stack.size));
        s
    }
}

fn push_listing(s: &mut String, start: usize, bytes: &[u8], by_addr: &HashMap<i64, Vec<&Label>>) {
    for (pos, byte) in bytes.iter().enumerate() {
        let addr = (start + pos) as i64;
        if let Some(labels) = by_addr.get(&addr) {
            for label in labels {
                if label.global {
                    s.push_str(&format!(".global {}\n", label.name));
                }
                s.push_str(&format!("{}:\n", label.name));
            }
        }
        s.push_str(&format!("    .byte {byte:#04X}\n"));
    }
}

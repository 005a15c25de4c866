//! ABC loader.
//!
//! Parsing is pure and all-or-nothing: either every table is read and every
//! cross reference checked, or an [`AbcError`] is returned and nothing is
//! kept.

use crate::abc::*;
use crate::reader::{ByteReader, ReadError};
use thiserror::Error;
use tracing::debug;

/// The only major version this loader understands.
pub const ABC_MAJOR_VERSION: u16 = 46;

/// Fatal problem with an ABC block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbcError {
    /// Major version is not 46
    #[error("unsupported ABC version {major}.{minor}")]
    UnsupportedVersion {
        /// Major version found
        major: u16,
        /// Minor version found
        minor: u16,
    },
    /// Ran out of bytes or hit a bad integer encoding
    #[error(transparent)]
    Read(#[from] ReadError),
    /// Cross reference past the end of a table
    #[error("{table} index {index} out of range (table has {len} entries)")]
    IndexOutOfRange {
        /// Table name
        table: &'static str,
        /// The bad index
        index: u32,
        /// Table length
        len: usize,
    },
    /// Unknown namespace kind byte
    #[error("invalid namespace kind 0x{0:02X}")]
    BadNamespaceKind(u8),
    /// Unknown multiname kind byte
    #[error("invalid multiname kind 0x{0:02X}")]
    BadMultinameKind(u8),
    /// Unknown trait kind nibble
    #[error("invalid trait kind {0}")]
    BadTraitKind(u8),
    /// Unknown constant value kind byte
    #[error("invalid constant kind 0x{0:02X}")]
    BadConstantKind(u8),
    /// Trait whose name is not a QName
    #[error("trait name multiname {0} is not a QName")]
    TraitNameNotQName(u32),
    /// Exception range outside the code it protects
    #[error("exception range outside the body of method {0}")]
    BadExceptionRange(u32),
    /// Two bodies for the same method
    #[error("method {0} has more than one body")]
    DuplicateBody(u32),
    /// Register or operand stack size past [`MAX_FRAME_SLOTS`]
    #[error("method {method} declares {field} {value}, limit is {}", MAX_FRAME_SLOTS)]
    FrameTooLarge {
        /// Method whose body is bad
        method: u32,
        /// `max_stack` or `local_count`
        field: &'static str,
        /// Declared value
        value: u32,
    },
    /// Slot id past [`MAX_SLOT_ID`]
    #[error("slot id {0} exceeds {}", MAX_SLOT_ID)]
    SlotIdTooLarge(u32),
    /// Bytes left after the last method body
    #[error("{0} trailing bytes after the last method body")]
    TrailingData(usize),
}

type AbcResult<T> = Result<T, AbcError>;

/// Largest `max_stack` or `local_count` a method body may declare.
pub const MAX_FRAME_SLOTS: u32 = 1 << 16;

/// Largest slot id a trait may name.
pub const MAX_SLOT_ID: u32 = 1 << 16;

const TRAIT_SLOT: u8 = 0;
const TRAIT_METHOD: u8 = 1;
const TRAIT_GETTER: u8 = 2;
const TRAIT_SETTER: u8 = 3;
const TRAIT_CLASS: u8 = 4;
const TRAIT_FUNCTION: u8 = 5;
const TRAIT_CONST: u8 = 6;

const ATTR_FINAL: u8 = 0x1;
const ATTR_OVERRIDE: u8 = 0x2;
const ATTR_METADATA: u8 = 0x4;

fn slot(slot_id: u32) -> AbcResult<u32> {
    if slot_id > MAX_SLOT_ID {
        return Err(AbcError::SlotIdTooLarge(slot_id));
    }
    Ok(slot_id)
}

fn frame_size(method: u32, field: &'static str, value: u32) -> AbcResult<u32> {
    if value > MAX_FRAME_SLOTS {
        return Err(AbcError::FrameTooLarge {
            method,
            field,
            value,
        });
    }
    Ok(value)
}

fn check(table: &'static str, index: u32, len: usize) -> AbcResult<u32> {
    if (index as usize) < len {
        Ok(index)
    } else {
        Err(AbcError::IndexOutOfRange { table, index, len })
    }
}

fn check_nonzero(table: &'static str, index: u32, len: usize) -> AbcResult<u32> {
    if index == 0 {
        return Err(AbcError::IndexOutOfRange { table, index, len });
    }
    check(table, index, len)
}

impl AbcFile {
    /// Parses and validates an ABC block.
    ///
    /// # Errors
    ///
    /// Returns an [`AbcError`] for any structural problem: truncation, an
    /// unknown kind byte, or any index pointing outside its table.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytecode_system::{AbcError, AbcFile};
    ///
    /// // Version 46.16, empty pools, no methods, classes, scripts or bodies.
    /// let bytes = [16, 0, 46, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    /// let abc = AbcFile::parse(&bytes).unwrap();
    /// assert!(abc.scripts.is_empty());
    ///
    /// assert!(matches!(
    ///     AbcFile::parse(&[16, 0, 45, 0]),
    ///     Err(AbcError::UnsupportedVersion { major: 45, .. })
    /// ));
    /// ```
    pub fn parse(data: &[u8]) -> Result<AbcFile, AbcError> {
        let mut parser = Parser {
            r: ByteReader::new(data),
            pool: ConstantPool::default(),
            method_count: 0,
            class_count: 0,
        };
        let abc = parser.parse_file()?;
        debug!(
            strings = abc.constant_pool.strings.len(),
            methods = abc.methods.len(),
            classes = abc.classes.len(),
            scripts = abc.scripts.len(),
            "loaded ABC {}.{}",
            abc.major_version,
            abc.minor_version
        );
        Ok(abc)
    }
}

struct Parser<'a> {
    r: ByteReader<'a>,
    pool: ConstantPool,
    method_count: usize,
    class_count: usize,
}

impl<'a> Parser<'a> {
    fn parse_file(&mut self) -> AbcResult<AbcFile> {
        let minor_version = self.r.u16()?;
        let major_version = self.r.u16()?;
        if major_version != ABC_MAJOR_VERSION {
            return Err(AbcError::UnsupportedVersion {
                major: major_version,
                minor: minor_version,
            });
        }

        self.parse_constant_pool()?;

        let method_count = self.r.u30()? as usize;
        self.method_count = method_count;
        let mut methods = Vec::with_capacity(method_count.min(4096));
        for _ in 0..method_count {
            methods.push(self.parse_method_info()?);
        }

        let metadata_count = self.r.u30()?;
        let mut metadata = Vec::new();
        for _ in 0..metadata_count {
            metadata.push(self.parse_metadata()?);
        }

        let class_count = self.r.u30()? as usize;
        self.class_count = class_count;
        let mut instances = Vec::with_capacity(class_count.min(4096));
        for _ in 0..class_count {
            instances.push(self.parse_instance(metadata.len())?);
        }
        let mut classes = Vec::with_capacity(class_count.min(4096));
        for _ in 0..class_count {
            let init_method = check("method", self.r.u30()?, self.method_count)?;
            let traits = self.parse_traits(metadata.len())?;
            classes.push(ClassInfo {
                init_method,
                traits,
            });
        }

        let script_count = self.r.u30()?;
        let mut scripts = Vec::new();
        for _ in 0..script_count {
            let init_method = check("method", self.r.u30()?, self.method_count)?;
            let traits = self.parse_traits(metadata.len())?;
            scripts.push(ScriptInfo {
                init_method,
                traits,
            });
        }

        let body_count = self.r.u30()?;
        let mut bodies = Vec::new();
        let mut body_of_method = vec![None; method_count];
        for _ in 0..body_count {
            let body = self.parse_body(metadata.len())?;
            let slot = &mut body_of_method[body.method as usize];
            if slot.is_some() {
                return Err(AbcError::DuplicateBody(body.method));
            }
            *slot = Some(bodies.len());
            bodies.push(body);
        }

        if !self.r.is_empty() {
            return Err(AbcError::TrailingData(self.r.remaining()));
        }

        Ok(AbcFile {
            minor_version,
            major_version,
            constant_pool: std::mem::take(&mut self.pool),
            methods,
            metadata,
            instances,
            classes,
            scripts,
            bodies,
            body_of_method,
        })
    }

    fn parse_constant_pool(&mut self) -> AbcResult<()> {
        let pool = &mut self.pool;
        let r = &mut self.r;

        pool.ints.push(0);
        for _ in 1..r.u30()?.max(1) {
            pool.ints.push(r.var_s32()?);
        }

        pool.uints.push(0);
        for _ in 1..r.u30()?.max(1) {
            pool.uints.push(r.var_u32()?);
        }

        pool.doubles.push(f64::NAN);
        for _ in 1..r.u30()?.max(1) {
            pool.doubles.push(r.f64()?);
        }

        pool.strings.push(String::new());
        for _ in 1..r.u30()?.max(1) {
            pool.strings.push(r.counted_string()?);
        }

        pool.namespaces.push(Namespace {
            kind: NamespaceKind::Namespace,
            name: 0,
        });
        for _ in 1..r.u30()?.max(1) {
            let byte = r.u8()?;
            let kind = NamespaceKind::from_byte(byte).ok_or(AbcError::BadNamespaceKind(byte))?;
            let name = check("string", r.u30()?, pool.strings.len())?;
            pool.namespaces.push(Namespace { kind, name });
        }

        pool.ns_sets.push(Vec::new());
        for _ in 1..r.u30()?.max(1) {
            let count = r.u30()?;
            let mut set = Vec::with_capacity(count.min(256) as usize);
            for _ in 0..count {
                set.push(check("namespace", r.u30()?, pool.namespaces.len())?);
            }
            pool.ns_sets.push(set);
        }

        pool.multinames.push(Multiname::Any);
        let multiname_count = r.u30()?.max(1);
        for _ in 1..multiname_count {
            let multiname = Self::parse_multiname(r, pool)?;
            pool.multinames.push(multiname);
        }

        // Type names may refer to any multiname, so check them last.
        for multiname in &pool.multinames {
            if let Multiname::TypeName { base, params } = multiname {
                check("multiname", *base, pool.multinames.len())?;
                for p in params {
                    check("multiname", *p, pool.multinames.len())?;
                }
            }
        }
        Ok(())
    }

    fn parse_multiname(r: &mut ByteReader<'_>, pool: &ConstantPool) -> AbcResult<Multiname> {
        let kind = r.u8()?;
        let strings = pool.strings.len();
        let namespaces = pool.namespaces.len();
        let ns_sets = pool.ns_sets.len();
        let multiname = match kind {
            0x07 | 0x0D => Multiname::QName {
                namespace: check("namespace", r.u30()?, namespaces)?,
                name: check("string", r.u30()?, strings)?,
                attribute: kind == 0x0D,
            },
            0x0F | 0x10 => Multiname::RTQName {
                name: check("string", r.u30()?, strings)?,
                attribute: kind == 0x10,
            },
            0x11 | 0x12 => Multiname::RTQNameL {
                attribute: kind == 0x12,
            },
            0x09 | 0x0E => Multiname::Multiname {
                name: check("string", r.u30()?, strings)?,
                ns_set: check_nonzero("namespace set", r.u30()?, ns_sets)?,
                attribute: kind == 0x0E,
            },
            0x1B | 0x1C => Multiname::MultinameL {
                ns_set: check_nonzero("namespace set", r.u30()?, ns_sets)?,
                attribute: kind == 0x1C,
            },
            0x1D => {
                let base = r.u30()?;
                let count = r.u30()?;
                let mut params = Vec::with_capacity(count.min(16) as usize);
                for _ in 0..count {
                    params.push(r.u30()?);
                }
                Multiname::TypeName { base, params }
            }
            other => return Err(AbcError::BadMultinameKind(other)),
        };
        Ok(multiname)
    }

    fn parse_constant_value(&mut self, kind_byte: u8, index: u32) -> AbcResult<ConstantValue> {
        let kind =
            ConstantKind::from_byte(kind_byte).ok_or(AbcError::BadConstantKind(kind_byte))?;
        let pool = &self.pool;
        match kind {
            ConstantKind::Int => check("int", index, pool.ints.len())?,
            ConstantKind::UInt => check("uint", index, pool.uints.len())?,
            ConstantKind::Double => check("double", index, pool.doubles.len())?,
            ConstantKind::Utf8 => check("string", index, pool.strings.len())?,
            ConstantKind::Namespace(_) => check("namespace", index, pool.namespaces.len())?,
            ConstantKind::Undefined
            | ConstantKind::True
            | ConstantKind::False
            | ConstantKind::Null => index,
        };
        Ok(ConstantValue { kind, index })
    }

    fn parse_method_info(&mut self) -> AbcResult<MethodInfo> {
        let multinames = self.pool.multinames.len();
        let strings = self.pool.strings.len();

        let param_count = self.r.u30()?;
        let return_type = check("multiname", self.r.u30()?, multinames)?;
        let mut param_types = Vec::with_capacity(param_count.min(64) as usize);
        for _ in 0..param_count {
            param_types.push(check("multiname", self.r.u30()?, multinames)?);
        }
        let name = check("string", self.r.u30()?, strings)?;
        let flags = MethodFlags(self.r.u8()?);

        let mut optional = Vec::new();
        if flags.has(MethodFlags::HAS_OPTIONAL) {
            let count = self.r.u30()?;
            for _ in 0..count {
                let index = self.r.u30()?;
                let kind = self.r.u8()?;
                optional.push(self.parse_constant_value(kind, index)?);
            }
        }

        let mut param_names = Vec::new();
        if flags.has(MethodFlags::HAS_PARAM_NAMES) {
            for _ in 0..param_count {
                param_names.push(check("string", self.r.u30()?, strings)?);
            }
        }

        Ok(MethodInfo {
            param_types,
            return_type,
            name,
            flags,
            optional,
            param_names,
        })
    }

    fn parse_metadata(&mut self) -> AbcResult<Metadata> {
        let strings = self.pool.strings.len();
        let name = check("string", self.r.u30()?, strings)?;
        let count = self.r.u30()?;
        let mut keys = Vec::with_capacity(count.min(64) as usize);
        for _ in 0..count {
            keys.push(check("string", self.r.u30()?, strings)?);
        }
        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            items.push((key, check("string", self.r.u30()?, strings)?));
        }
        Ok(Metadata { name, items })
    }

    fn parse_instance(&mut self, metadata_count: usize) -> AbcResult<InstanceInfo> {
        let multinames = self.pool.multinames.len();
        let name = check_nonzero("multiname", self.r.u30()?, multinames)?;
        let super_name = check("multiname", self.r.u30()?, multinames)?;
        let flags = self.r.u8()?;
        let protected_ns = if flags & InstanceInfo::PROTECTED_NS != 0 {
            Some(check(
                "namespace",
                self.r.u30()?,
                self.pool.namespaces.len(),
            )?)
        } else {
            None
        };
        let interface_count = self.r.u30()?;
        let mut interfaces = Vec::with_capacity(interface_count.min(64) as usize);
        for _ in 0..interface_count {
            interfaces.push(check_nonzero("multiname", self.r.u30()?, multinames)?);
        }
        let init_method = check("method", self.r.u30()?, self.method_count)?;
        let traits = self.parse_traits(metadata_count)?;
        Ok(InstanceInfo {
            name,
            super_name,
            flags,
            protected_ns,
            interfaces,
            init_method,
            traits,
        })
    }

    fn parse_traits(&mut self, metadata_count: usize) -> AbcResult<Vec<Trait>> {
        let count = self.r.u30()?;
        let mut traits = Vec::with_capacity(count.min(256) as usize);
        for _ in 0..count {
            traits.push(self.parse_trait(metadata_count)?);
        }
        Ok(traits)
    }

    fn parse_trait(&mut self, metadata_count: usize) -> AbcResult<Trait> {
        let multinames = self.pool.multinames.len();
        let name = check("multiname", self.r.u30()?, multinames)?;
        if !matches!(self.pool.multinames[name as usize], Multiname::QName { .. }) {
            return Err(AbcError::TraitNameNotQName(name));
        }

        let tag = self.r.u8()?;
        let kind_bits = tag & 0x0F;
        let attributes = tag >> 4;

        let kind = match kind_bits {
            TRAIT_SLOT | TRAIT_CONST => {
                let slot_id = slot(self.r.u30()?)?;
                let type_name = check("multiname", self.r.u30()?, multinames)?;
                let vindex = self.r.u30()?;
                let value = if vindex != 0 {
                    let vkind = self.r.u8()?;
                    Some(self.parse_constant_value(vkind, vindex)?)
                } else {
                    None
                };
                if kind_bits == TRAIT_SLOT {
                    TraitKind::Slot {
                        slot_id,
                        type_name,
                        value,
                    }
                } else {
                    TraitKind::Const {
                        slot_id,
                        type_name,
                        value,
                    }
                }
            }
            TRAIT_CLASS => TraitKind::Class {
                slot_id: slot(self.r.u30()?)?,
                class: check("class", self.r.u30()?, self.class_count)?,
            },
            TRAIT_FUNCTION => TraitKind::Function {
                slot_id: slot(self.r.u30()?)?,
                method: check("method", self.r.u30()?, self.method_count)?,
            },
            TRAIT_METHOD | TRAIT_GETTER | TRAIT_SETTER => {
                let disp_id = self.r.u30()?;
                let method = check("method", self.r.u30()?, self.method_count)?;
                match kind_bits {
                    TRAIT_METHOD => TraitKind::Method { disp_id, method },
                    TRAIT_GETTER => TraitKind::Getter { disp_id, method },
                    _ => TraitKind::Setter { disp_id, method },
                }
            }
            other => return Err(AbcError::BadTraitKind(other)),
        };

        let mut metadata = Vec::new();
        if attributes & ATTR_METADATA != 0 {
            let count = self.r.u30()?;
            for _ in 0..count {
                metadata.push(check("metadata", self.r.u30()?, metadata_count)?);
            }
        }

        Ok(Trait {
            name,
            kind,
            is_final: attributes & ATTR_FINAL != 0,
            is_override: attributes & ATTR_OVERRIDE != 0,
            metadata,
        })
    }

    fn parse_body(&mut self, metadata_count: usize) -> AbcResult<MethodBody> {
        let method = check("method", self.r.u30()?, self.method_count)?;
        let max_stack = frame_size(method, "max_stack", self.r.u30()?)?;
        let local_count = frame_size(method, "local_count", self.r.u30()?)?;
        let init_scope_depth = self.r.u30()?;
        let max_scope_depth = self.r.u30()?;
        let code_len = self.r.u30()? as usize;
        let code = self.r.bytes(code_len)?.to_vec();

        let multinames = self.pool.multinames.len();
        let exception_count = self.r.u30()?;
        let mut exceptions = Vec::with_capacity(exception_count.min(64) as usize);
        for _ in 0..exception_count {
            let info = ExceptionInfo {
                from: self.r.u30()?,
                to: self.r.u30()?,
                target: self.r.u30()?,
                exception_type: check("multiname", self.r.u30()?, multinames)?,
                var_name: check("multiname", self.r.u30()?, multinames)?,
            };
            let len = code.len() as u32;
            if info.from > info.to || info.to > len || info.target >= len {
                return Err(AbcError::BadExceptionRange(method));
            }
            exceptions.push(info);
        }

        let traits = self.parse_traits(metadata_count)?;
        Ok(MethodBody {
            method,
            max_stack,
            local_count,
            init_scope_depth,
            max_scope_depth,
            code,
            exceptions,
            traits,
        })
    }
}

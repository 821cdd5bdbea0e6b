// Copyright 2025 HyperZoekt Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Declaration-only decoding of compiled class files.
//!
//! Only the structural header is read: constant pool, access flags, this and
//! super class, interfaces, fields and methods with their descriptors. Code
//! and generic signatures are skipped, so compiled declarations are always
//! matched through their erasure.

use super::model::*;
use crate::error::ParseError;

const MAGIC: u32 = 0xCAFE_BABE;

const ACC_PUBLIC: u16 = 0x0001;
const ACC_PRIVATE: u16 = 0x0002;
const ACC_PROTECTED: u16 = 0x0004;
const ACC_STATIC: u16 = 0x0008;
const ACC_FINAL: u16 = 0x0010;
const ACC_BRIDGE: u16 = 0x0040;
const ACC_VARARGS: u16 = 0x0080;
const ACC_INTERFACE: u16 = 0x0200;
const ACC_ABSTRACT: u16 = 0x0400;
const ACC_SYNTHETIC: u16 = 0x1000;
const ACC_ANNOTATION: u16 = 0x2000;
const ACC_ENUM: u16 = 0x4000;

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Class(u16),
    Other,
    /// Second slot of a long or double.
    Unusable,
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|e| *e <= self.buf.len())
            .ok_or_else(|| ParseError::ClassFile(format!("truncated at offset {}", self.pos)))?;
        let s = &self.buf[self.pos..end];
        self.pos = end;
        Ok(s)
    }

    fn u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ParseError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ParseError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

struct Pool(Vec<Constant>);

impl Pool {
    fn utf8(&self, idx: u16) -> Result<&str, ParseError> {
        match self.0.get(idx as usize) {
            Some(Constant::Utf8(s)) => Ok(s),
            _ => Err(ParseError::ClassFile(format!(
                "constant {} is not a utf8 entry",
                idx
            ))),
        }
    }

    fn class_name(&self, idx: u16) -> Result<&str, ParseError> {
        match self.0.get(idx as usize) {
            Some(Constant::Class(name)) => self.utf8(*name),
            _ => Err(ParseError::ClassFile(format!(
                "constant {} is not a class entry",
                idx
            ))),
        }
    }
}

fn read_pool(r: &mut Reader) -> Result<Pool, ParseError> {
    let count = r.u16()? as usize;
    let mut entries = vec![Constant::Unusable; count.max(1)];
    let mut i = 1;
    while i < count {
        let tag = r.u8()?;
        let (entry, width) = match tag {
            1 => {
                let len = r.u16()? as usize;
                let bytes = r.take(len)?;
                (
                    Constant::Utf8(String::from_utf8_lossy(bytes).into_owned()),
                    1,
                )
            }
            7 => (Constant::Class(r.u16()?), 1),
            3 | 4 => {
                r.take(4)?;
                (Constant::Other, 1)
            }
            5 | 6 => {
                r.take(8)?;
                (Constant::Other, 2)
            }
            8 | 16 | 19 | 20 => {
                r.take(2)?;
                (Constant::Other, 1)
            }
            9 | 10 | 11 | 12 | 17 | 18 => {
                r.take(4)?;
                (Constant::Other, 1)
            }
            15 => {
                r.take(3)?;
                (Constant::Other, 1)
            }
            other => {
                return Err(ParseError::ClassFile(format!(
                    "unknown constant tag {} at index {}",
                    other, i
                )))
            }
        };
        entries[i] = entry;
        i += width;
    }
    Ok(Pool(entries))
}

/// `java/util/Map$Entry` -> `java.util.Map.Entry`
fn internal_to_qualified(name: &str) -> String {
    name.replace(['/', '$'], ".")
}

fn parse_field_type(desc: &[u8], pos: &mut usize) -> Option<TypeSig> {
    let mut dims = 0u8;
    while desc.get(*pos) == Some(&b'[') {
        dims = dims.saturating_add(1);
        *pos += 1;
    }
    let c = *desc.get(*pos)?;
    *pos += 1;
    let name = match c {
        b'B' => "byte".to_string(),
        b'C' => "char".to_string(),
        b'D' => "double".to_string(),
        b'F' => "float".to_string(),
        b'I' => "int".to_string(),
        b'J' => "long".to_string(),
        b'S' => "short".to_string(),
        b'Z' => "boolean".to_string(),
        b'V' => "void".to_string(),
        b'L' => {
            let start = *pos;
            let end = start + desc[start..].iter().position(|b| *b == b';')?;
            *pos = end + 1;
            internal_to_qualified(std::str::from_utf8(&desc[start..end]).ok()?)
        }
        _ => return None,
    };
    Some(TypeSig::simple(name).array(dims))
}

/// Parse `(ILjava/lang/String;)V` into parameter and return types.
pub fn parse_method_descriptor(desc: &str) -> Option<(Vec<TypeSig>, TypeSig)> {
    let bytes = desc.as_bytes();
    if bytes.first() != Some(&b'(') {
        return None;
    }
    let mut pos = 1;
    let mut params = Vec::new();
    while bytes.get(pos) != Some(&b')') {
        params.push(parse_field_type(bytes, &mut pos)?);
    }
    pos += 1;
    let ret = parse_field_type(bytes, &mut pos)?;
    Some((params, ret))
}

fn modifiers(flags: u16) -> Modifiers {
    let mut m = Modifiers::default();
    for (acc, bit) in [
        (ACC_PUBLIC, Modifiers::PUBLIC),
        (ACC_PRIVATE, Modifiers::PRIVATE),
        (ACC_PROTECTED, Modifiers::PROTECTED),
        (ACC_STATIC, Modifiers::STATIC),
        (ACC_FINAL, Modifiers::FINAL),
        (ACC_ABSTRACT, Modifiers::ABSTRACT),
    ] {
        if flags & acc != 0 {
            m.insert(bit);
        }
    }
    m
}

struct Member {
    flags: u16,
    name: String,
    descriptor: String,
    deprecated: bool,
}

fn read_members(r: &mut Reader, pool: &Pool) -> Result<Vec<Member>, ParseError> {
    let count = r.u16()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let flags = r.u16()?;
        let name = pool.utf8(r.u16()?)?.to_string();
        let descriptor = pool.utf8(r.u16()?)?.to_string();
        let deprecated = skip_attributes(r, pool)?;
        out.push(Member {
            flags,
            name,
            descriptor,
            deprecated,
        });
    }
    Ok(out)
}

/// Skips an attribute table, reporting whether it carried `Deprecated`.
fn skip_attributes(r: &mut Reader, pool: &Pool) -> Result<bool, ParseError> {
    let count = r.u16()?;
    let mut deprecated = false;
    for _ in 0..count {
        let name = r.u16()?;
        let len = r.u32()? as usize;
        r.take(len)?;
        if pool.utf8(name).map(|n| n == "Deprecated").unwrap_or(false) {
            deprecated = true;
        }
    }
    Ok(deprecated)
}

fn is_local_or_anonymous(simple: &str) -> bool {
    simple
        .chars()
        .next()
        .map(|c| c.is_ascii_digit())
        .unwrap_or(true)
}

/// Decode a class file into a declaration-only unit.
pub fn parse_class(bytes: &[u8]) -> Result<CompilationUnit, ParseError> {
    let mut r = Reader { buf: bytes, pos: 0 };
    if r.u32()? != MAGIC {
        return Err(ParseError::ClassFile("bad magic".into()));
    }
    let _minor = r.u16()?;
    let _major = r.u16()?;
    let pool = read_pool(&mut r)?;
    let access = r.u16()?;
    let this_internal = pool.class_name(r.u16()?)?.to_string();
    let super_idx = r.u16()?;
    let super_internal = if super_idx == 0 {
        None
    } else {
        Some(pool.class_name(super_idx)?.to_string())
    };
    let iface_count = r.u16()?;
    let mut interfaces = Vec::with_capacity(iface_count as usize);
    for _ in 0..iface_count {
        interfaces.push(internal_to_qualified(pool.class_name(r.u16()?)?));
    }
    let fields = read_members(&mut r, &pool)?;
    let methods = read_members(&mut r, &pool)?;
    let deprecated = skip_attributes(&mut r, &pool)?;

    let mut unit = CompilationUnit::default();
    let (package, binary_simple) = match this_internal.rfind('/') {
        Some(i) => (
            this_internal[..i].replace('/', "."),
            &this_internal[i + 1..],
        ),
        None => (String::new(), this_internal.as_str()),
    };
    if !package.is_empty() {
        unit.package = Some(NamedDecl {
            name: package,
            range: None,
        });
    }
    if binary_simple == "package-info" || binary_simple == "module-info" {
        return Ok(unit);
    }
    let simple = binary_simple.rsplit('$').next().unwrap_or(binary_simple);
    if is_local_or_anonymous(simple) || access & ACC_SYNTHETIC != 0 {
        return Ok(unit);
    }

    let kind = if access & ACC_ANNOTATION != 0 {
        TypeKind::Annotation
    } else if access & ACC_INTERFACE != 0 {
        TypeKind::Interface
    } else if access & ACC_ENUM != 0 {
        TypeKind::Enum
    } else if super_internal.as_deref() == Some("java/lang/Record") {
        TypeKind::Record
    } else {
        TypeKind::Class
    };
    let mut decl = TypeDecl::new(simple, internal_to_qualified(&this_internal), kind);
    decl.modifiers = modifiers(access);
    if deprecated {
        decl.modifiers.insert(Modifiers::DEPRECATED);
    }
    if !matches!(kind, TypeKind::Interface | TypeKind::Annotation) {
        decl.superclass = super_internal
            .as_deref()
            .map(|s| TypeSig::simple(internal_to_qualified(s)));
    }
    decl.interfaces = interfaces.into_iter().map(TypeSig::simple).collect();

    for f in fields {
        if f.flags & ACC_SYNTHETIC != 0 {
            continue;
        }
        let mut pos = 0;
        let Some(ty) = parse_field_type(f.descriptor.as_bytes(), &mut pos) else {
            return Err(ParseError::ClassFile(format!(
                "bad field descriptor {}",
                f.descriptor
            )));
        };
        let mut m = modifiers(f.flags);
        if f.deprecated {
            m.insert(Modifiers::DEPRECATED);
        }
        decl.fields.push(FieldDecl {
            name: f.name,
            name_range: None,
            ty,
            modifiers: m,
            enum_constant: f.flags & ACC_ENUM != 0,
        });
    }

    for mth in methods {
        if mth.flags & (ACC_SYNTHETIC | ACC_BRIDGE) != 0 || mth.name == "<clinit>" {
            continue;
        }
        let Some((param_types, ret)) = parse_method_descriptor(&mth.descriptor) else {
            return Err(ParseError::ClassFile(format!(
                "bad method descriptor {}",
                mth.descriptor
            )));
        };
        let varargs = mth.flags & ACC_VARARGS != 0;
        let count = param_types.len();
        let params = param_types
            .into_iter()
            .enumerate()
            .map(|(i, ty)| Param {
                name: format!("arg{}", i),
                ty,
                varargs: varargs && i + 1 == count,
            })
            .collect();
        let is_constructor = mth.name == "<init>";
        let mut m = modifiers(mth.flags);
        if mth.deprecated {
            m.insert(Modifiers::DEPRECATED);
        }
        let decl_m = MethodDecl {
            name: if is_constructor {
                simple.to_string()
            } else {
                mth.name
            },
            name_range: None,
            modifiers: m,
            type_params: Vec::new(),
            params,
            return_type: (!is_constructor).then_some(ret),
            body: None,
            is_constructor,
        };
        if is_constructor {
            decl.constructors.push(decl_m);
        } else {
            decl.methods.push(decl_m);
        }
    }

    unit.types.push(decl);
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ClassFileBuilder;

    #[test]
    fn descriptors() {
        let (params, ret) = parse_method_descriptor("(I[Ljava/lang/String;J)V").expect("desc");
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].name, "int");
        assert_eq!(params[1].to_string(), "java.lang.String[]");
        assert_eq!(params[2].name, "long");
        assert_eq!(ret.name, "void");
        assert!(parse_method_descriptor("I)V").is_none());
        assert!(parse_method_descriptor("(Q)V").is_none());
    }

    #[test]
    fn decodes_built_class() {
        let bytes = ClassFileBuilder::new("p/Outer$Inner")
            .superclass("p/Base")
            .interface("java/lang/Runnable")
            .field(ACC_PRIVATE, "count", "I")
            .method(ACC_PUBLIC, "<init>", "(Ljava/lang/String;)V")
            .method(ACC_PUBLIC, "run", "()V")
            .method(ACC_PUBLIC | ACC_VARARGS, "all", "([Ljava/lang/Object;)I")
            .method(ACC_STATIC, "<clinit>", "()V")
            .build();
        let unit = parse_class(&bytes).expect("class");
        assert!(!unit.has_source);
        assert_eq!(unit.package_name(), "p");
        let t = &unit.types[0];
        assert_eq!(t.name, "Inner");
        assert_eq!(t.qualified, "p.Outer.Inner");
        assert_eq!(t.superclass.as_ref().map(|s| s.name.as_str()), Some("p.Base"));
        assert_eq!(t.interfaces[0].name, "java.lang.Runnable");
        assert_eq!(t.fields[0].ty.name, "int");
        assert_eq!(t.constructors.len(), 1);
        assert_eq!(t.constructors[0].name, "Inner");
        assert_eq!(t.methods.len(), 2);
        assert!(t.methods[1].is_varargs());
    }

    #[test]
    fn anonymous_classes_contribute_nothing() {
        let bytes = ClassFileBuilder::new("p/Outer$1").build();
        let unit = parse_class(&bytes).expect("class");
        assert!(unit.types.is_empty());
    }

    #[test]
    fn truncated_input_is_an_error() {
        let bytes = ClassFileBuilder::new("p/A").build();
        assert!(parse_class(&bytes[..bytes.len() / 2]).is_err());
        assert!(parse_class(b"not a class").is_err());
    }
}

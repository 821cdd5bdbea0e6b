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

//! Fixture builders shared by unit tests and the integration tests under
//! `tests/`, which compile as a separate crate.

use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Writes minimal, structurally valid class files.
pub struct ClassFileBuilder {
    this: String,
    access: u16,
    super_name: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<(u16, String, String)>,
    methods: Vec<(u16, String, String)>,
}

impl ClassFileBuilder {
    /// `this` is an internal name such as `p/Outer$Inner`.
    pub fn new(this: &str) -> Self {
        Self {
            this: this.to_string(),
            access: 0x0021,
            super_name: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn access(mut self, flags: u16) -> Self {
        self.access = flags;
        self
    }

    pub fn superclass(mut self, name: &str) -> Self {
        self.super_name = Some(name.to_string());
        self
    }

    pub fn interface(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    pub fn field(mut self, flags: u16, name: &str, descriptor: &str) -> Self {
        self.fields
            .push((flags, name.to_string(), descriptor.to_string()));
        self
    }

    pub fn method(mut self, flags: u16, name: &str, descriptor: &str) -> Self {
        self.methods
            .push((flags, name.to_string(), descriptor.to_string()));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = PoolWriter::default();
        let this_idx = pool.class(&self.this);
        let super_idx = self.super_name.as_deref().map(|s| pool.class(s)).unwrap_or(0);
        let iface_idx: Vec<u16> = self.interfaces.iter().map(|i| pool.class(i)).collect();
        let field_idx: Vec<(u16, u16, u16)> = self
            .fields
            .iter()
            .map(|(f, n, d)| (*f, pool.utf8(n), pool.utf8(d)))
            .collect();
        let method_idx: Vec<(u16, u16, u16)> = self
            .methods
            .iter()
            .map(|(f, n, d)| (*f, pool.utf8(n), pool.utf8(d)))
            .collect();

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());
        out.extend_from_slice(&(pool.count + 1).to_be_bytes());
        out.extend_from_slice(&pool.bytes);
        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&this_idx.to_be_bytes());
        out.extend_from_slice(&super_idx.to_be_bytes());
        out.extend_from_slice(&(iface_idx.len() as u16).to_be_bytes());
        for i in iface_idx {
            out.extend_from_slice(&i.to_be_bytes());
        }
        for members in [field_idx, method_idx] {
            out.extend_from_slice(&(members.len() as u16).to_be_bytes());
            for (flags, name, desc) in members {
                out.extend_from_slice(&flags.to_be_bytes());
                out.extend_from_slice(&name.to_be_bytes());
                out.extend_from_slice(&desc.to_be_bytes());
                out.extend_from_slice(&0u16.to_be_bytes());
            }
        }
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }
}

#[derive(Default)]
struct PoolWriter {
    bytes: Vec<u8>,
    count: u16,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
}

impl PoolWriter {
    fn utf8(&mut self, s: &str) -> u16 {
        if let Some(i) = self.utf8.get(s) {
            return *i;
        }
        self.bytes.push(1);
        self.bytes.extend_from_slice(&(s.len() as u16).to_be_bytes());
        self.bytes.extend_from_slice(s.as_bytes());
        self.count += 1;
        self.utf8.insert(s.to_string(), self.count);
        self.count
    }

    fn class(&mut self, name: &str) -> u16 {
        if let Some(i) = self.classes.get(name) {
            return *i;
        }
        let n = self.utf8(name);
        self.bytes.push(7);
        self.bytes.extend_from_slice(&n.to_be_bytes());
        self.count += 1;
        self.classes.insert(name.to_string(), self.count);
        self.count
    }
}

/// Write a jar holding the given entries.
pub fn write_jar(path: &Path, entries: &[(&str, Vec<u8>)]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, bytes) in entries {
        writer.start_file(*name, options)?;
        writer.write_all(bytes)?;
    }
    writer.finish()?;
    Ok(())
}

/// Write `(relative path, content)` pairs below `root`.
pub fn write_sources(root: &Path, files: &[(&str, &str)]) -> Result<()> {
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }
    Ok(())
}

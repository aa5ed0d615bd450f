//! Class-name table embedded in exported YOLO models.
//!
//! Ultralytics writes the table into the ONNX metadata under `names` as a Python
//! dict literal, e.g. `{0: 'person', 1: 'bicycle'}`. Some toolchains write JSON
//! instead, so both are accepted.

use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassNames(BTreeMap<u32, String>);

impl ClassNames {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        if let Ok(json) = serde_json::from_str::<HashMap<String, String>>(raw) {
            return json
                .into_iter()
                .map(|(id, name)| -> anyhow::Result<(u32, String)> {
                    Ok((id.trim().parse()?, name))
                })
                .collect::<anyhow::Result<BTreeMap<_, _>>>()
                .map(Self);
        }
        parse_python_dict(raw).map(Self)
    }

    /// Human-readable label, falling back to the numeric id for unmapped classes.
    pub fn label(&self, class_id: u32) -> String {
        self.0
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| class_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(u32, S)> for ClassNames {
    fn from_iter<I: IntoIterator<Item = (u32, S)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(id, name)| (id, name.into())).collect())
    }
}

fn parse_python_dict(raw: &str) -> anyhow::Result<BTreeMap<u32, String>> {
    let body = raw
        .trim()
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| anyhow::anyhow!("class names are not a dict literal"))?;

    let mut names = BTreeMap::new();
    let mut chars = body.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != ':') {
            key.push(c);
        }
        anyhow::ensure!(chars.next() == Some(':'), "missing ':' after key {:?}", key);
        let id: u32 = key
            .trim()
            .trim_matches(|c| c == '\'' || c == '"')
            .parse()
            .map_err(|_| anyhow::anyhow!("class id {:?} is not an integer", key.trim()))?;

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let quote = chars
            .next()
            .filter(|c| *c == '\'' || *c == '"')
            .ok_or_else(|| anyhow::anyhow!("class {} has no quoted name", id))?;

        let mut name = String::new();
        loop {
            match chars.next() {
                Some('\\') => match chars.next() {
                    Some(escaped) => name.push(escaped),
                    None => anyhow::bail!("dangling escape in name of class {}", id),
                },
                Some(c) if c == quote => break,
                Some(c) => name.push(c),
                None => anyhow::bail!("unterminated name for class {}", id),
            }
        }

        names.insert(id, name);
    }

    Ok(names)
}

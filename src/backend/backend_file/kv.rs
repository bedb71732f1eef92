use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};

use log::error;

use super::FindError;

pub type KeyValues = BTreeMap<String, String>;

/// Parses `key: value` lines, insisting every one of `keys` is present.
pub fn read(input: impl Read, keys: &[&str]) -> Result<KeyValues, FindError> {
    let mut kv = KeyValues::new();

    for line in BufReader::new(input).lines() {
        let line = line.map_err(|e| {
            error!("couldn't read line: {e}");
            FindError::Internal
        })?;

        let (k, v) = line.split_once(':').ok_or_else(|| {
            error!("invalid line, can't split");
            FindError::Internal
        })?;

        let Some(v) = v.strip_prefix(' ') else {
            error!("invalid line - no whitespace after colon");
            return Err(FindError::Internal);
        };
        kv.insert(k.into(), v.into());
    }

    if let Some(missing) = keys.iter().find(|k| !kv.contains_key(**k)) {
        error!("missing key \"{missing}\"");
        return Err(FindError::Internal);
    }

    Ok(kv)
}

pub fn write(mut output: impl Write, keyvalues: &KeyValues) -> Result<(), std::io::Error> {
    for (k, v) in keyvalues {
        writeln!(output, "{}: {}", k, v)?;
    }
    output.flush()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reads_what_it_writes() {
        let mut kv = KeyValues::new();
        kv.insert("username".into(), "alice".into());
        kv.insert("pwhash".into(), "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into());

        let mut out = vec![];
        write(&mut out, &kv).unwrap();

        assert_eq!(
            std::str::from_utf8(&out).unwrap(),
            "pwhash: $argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA\nusername: alice\n"
        );
        assert_eq!(read(&out[..], &["username", "pwhash"]).unwrap(), kv);
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(matches!(
            read(&b"username alice\n"[..], &[]),
            Err(FindError::Internal)
        ));
        assert!(matches!(
            read(&b"username:alice\n"[..], &[]),
            Err(FindError::Internal)
        ));
    }

    #[test]
    fn requires_keys() {
        assert!(matches!(
            read(&b"username: alice\n"[..], &["username", "pwhash"]),
            Err(FindError::Internal)
        ));
    }
}

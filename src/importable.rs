use std::io::BufRead;

use anyhow::Result;

pub trait Importable {
    fn import(reader: &mut dyn BufRead) -> Result<Self>
    where
        Self: Sized;
}

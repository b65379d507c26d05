use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{LoteItemRow, LoteRow};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} value `{value}`")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownValue {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Cfc,
    Interno,
    Operador,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Cfc, Role::Interno, Role::Operador];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Cfc => "cfc",
            Role::Interno => "interno",
            Role::Operador => "operador",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Role::Admin),
            "cfc" => Ok(Role::Cfc),
            "interno" => Ok(Role::Interno),
            "operador" => Ok(Role::Operador),
            other => Err(UnknownValue::new("role", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document kind carried by a lote and all of its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LoteTipo {
    #[serde(rename = "CNH")]
    Cnh,
    #[serde(rename = "PID")]
    Pid,
}

impl LoteTipo {
    /// Lote numbers starting with this letter (any case) hold PID documents.
    pub const PID_MARKER: char = 'P';

    /// Derives the type from the first character of a lote number.
    pub fn from_numero(numero: &str) -> Self {
        match numero.trim_start().chars().next() {
            Some(first) if first.to_ascii_uppercase() == Self::PID_MARKER => LoteTipo::Pid,
            _ => LoteTipo::Cnh,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoteTipo::Cnh => "CNH",
            LoteTipo::Pid => "PID",
        }
    }
}

impl FromStr for LoteTipo {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CNH" => Ok(LoteTipo::Cnh),
            "PID" => Ok(LoteTipo::Pid),
            other => Err(UnknownValue::new("tipo", other)),
        }
    }
}

impl fmt::Display for LoteTipo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoteStatus {
    Pendente,
    Recebido,
    EmSeparacao,
}

impl LoteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LoteStatus::Pendente => "pendente",
            LoteStatus::Recebido => "recebido",
            LoteStatus::EmSeparacao => "em_separacao",
        }
    }
}

impl FromStr for LoteStatus {
    type Err = UnknownValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pendente" => Ok(LoteStatus::Pendente),
            "recebido" => Ok(LoteStatus::Recebido),
            "em_separacao" => Ok(LoteStatus::EmSeparacao),
            other => Err(UnknownValue::new("status", other)),
        }
    }
}

impl fmt::Display for LoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoteItem {
    pub id: i32,
    pub nome: String,
    /// `None` marks an unaffiliated ("particular") document holder.
    pub cfc: Option<String>,
    pub tipo: LoteTipo,
    pub numero_documento: String,
}

impl TryFrom<LoteItemRow> for LoteItem {
    type Error = UnknownValue;

    fn try_from(row: LoteItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            nome: row.nome,
            cfc: row.cfc,
            tipo: row.tipo.parse()?,
            numero_documento: row.numero_documento,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lote {
    pub id: i32,
    pub numero: String,
    pub tipo: LoteTipo,
    pub status: LoteStatus,
    pub criado_por: String,
    pub criado_em: NaiveDateTime,
    pub atualizado_por: Option<String>,
    pub atualizado_em: Option<NaiveDateTime>,
    pub pdf_filename: Option<String>,
    pub items: Vec<LoteItem>,
}

impl Lote {
    pub fn from_row(row: LoteRow, items: Vec<LoteItem>) -> Result<Self, UnknownValue> {
        Ok(Self {
            id: row.id,
            numero: row.numero,
            tipo: row.tipo.parse()?,
            status: row.status.parse()?,
            criado_por: row.criado_por,
            criado_em: row.criado_em,
            atualizado_por: row.atualizado_por,
            atualizado_em: row.atualizado_em,
            pdf_filename: row.pdf_filename,
            items,
        })
    }
}

use std::collections::HashMap;

use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use thiserror::Error;

use crate::domain::{Lote, LoteItem, LoteStatus, LoteTipo, UnknownValue};
use crate::models::{LoteItemRow, LoteRow, NewLoteItemRow, NewLoteRow};
use crate::schema::{lote_items, lotes};

#[derive(Debug, Error)]
pub enum LoteStoreError {
    #[error("lote number already exists")]
    DuplicateNumero,
    #[error("stored lote is invalid: {0}")]
    Corrupt(#[from] UnknownValue),
    #[error("database error: {0}")]
    Database(DieselError),
}

impl From<DieselError> for LoteStoreError {
    fn from(value: DieselError) -> Self {
        match value {
            // `lotes.numero` is the only unique column these tables carry.
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                LoteStoreError::DuplicateNumero
            }
            other => LoteStoreError::Database(other),
        }
    }
}

pub type LoteStoreResult<T> = Result<T, LoteStoreError>;

#[derive(Debug, Clone)]
pub struct NewLoteItem {
    pub nome: String,
    pub cfc: Option<String>,
    pub numero_documento: String,
}

#[derive(Debug, Clone)]
pub struct NewLote {
    pub numero: String,
    pub status: LoteStatus,
    pub criado_por: String,
    pub items: Vec<NewLoteItem>,
    pub pdf_filename: Option<String>,
}

/// Trimmed and upper-cased; uniqueness is checked on this form.
pub fn normalize_numero(numero: &str) -> String {
    numero.trim().to_uppercase()
}

/// Inserts the lote and every item in one transaction. The lote type is
/// derived from the number and copied onto each item.
pub fn create_lote(conn: &mut SqliteConnection, input: &NewLote) -> LoteStoreResult<Lote> {
    let numero = normalize_numero(&input.numero);
    let tipo = LoteTipo::from_numero(&numero);

    conn.transaction::<Lote, LoteStoreError, _>(|conn| {
        let row = diesel::insert_into(lotes::table)
            .values(&NewLoteRow {
                numero: &numero,
                tipo: tipo.as_str(),
                status: input.status.as_str(),
                criado_por: &input.criado_por,
                criado_em: Utc::now().naive_utc(),
                pdf_filename: input.pdf_filename.as_deref(),
            })
            .returning(LoteRow::as_returning())
            .get_result(conn)?;

        let new_items: Vec<NewLoteItemRow<'_>> = input
            .items
            .iter()
            .map(|item| NewLoteItemRow {
                lote_id: row.id,
                nome: &item.nome,
                cfc: item.cfc.as_deref(),
                tipo: tipo.as_str(),
                numero_documento: &item.numero_documento,
            })
            .collect();

        let mut items = Vec::with_capacity(new_items.len());
        for new_item in &new_items {
            let item_row = diesel::insert_into(lote_items::table)
                .values(new_item)
                .returning(LoteItemRow::as_returning())
                .get_result(conn)?;
            items.push(LoteItem::try_from(item_row)?);
        }

        Ok(Lote::from_row(row, items)?)
    })
}

pub fn get_lote(conn: &mut SqliteConnection, id: i32) -> LoteStoreResult<Option<Lote>> {
    let Some(row) = lotes::table
        .find(id)
        .select(LoteRow::as_select())
        .first(conn)
        .optional()?
    else {
        return Ok(None);
    };

    let items = LoteItemRow::belonging_to(&row)
        .select(LoteItemRow::as_select())
        .order(lote_items::id.asc())
        .load(conn)?;

    Ok(Some(Lote::from_row(row, parse_items(items))?))
}

/// Every lote with its items, newest first. Item rows that no longer parse
/// are dropped rather than failing the whole listing.
pub fn list_lotes(conn: &mut SqliteConnection) -> LoteStoreResult<Vec<Lote>> {
    let rows: Vec<LoteRow> = lotes::table
        .select(LoteRow::as_select())
        .order((lotes::criado_em.desc(), lotes::id.desc()))
        .load(conn)?;

    // No id list: SQLite caps bound parameters per statement.
    let item_rows: Vec<LoteItemRow> = lote_items::table
        .select(LoteItemRow::as_select())
        .order(lote_items::id.asc())
        .load(conn)?;

    let mut grouped: HashMap<i32, Vec<LoteItemRow>> = HashMap::new();
    for item in item_rows {
        grouped.entry(item.lote_id).or_default().push(item);
    }

    rows.into_iter()
        .map(|row| {
            let items = parse_items(grouped.remove(&row.id).unwrap_or_default());
            Lote::from_row(row, items).map_err(LoteStoreError::from)
        })
        .collect()
}

fn parse_items(rows: Vec<LoteItemRow>) -> Vec<LoteItem> {
    rows.into_iter()
        .filter_map(|row| {
            let item_id = row.id;
            match LoteItem::try_from(row) {
                Ok(item) => Some(item),
                Err(err) => {
                    tracing::debug!(item_id, error = %err, "dropping unreadable lote item");
                    None
                }
            }
        })
        .collect()
}

/// Any status may follow any other. Returns rows affected; 0 for an unknown id.
pub fn update_lote_status(
    conn: &mut SqliteConnection,
    id: i32,
    status: LoteStatus,
    atualizado_por: &str,
) -> LoteStoreResult<usize> {
    Ok(diesel::update(lotes::table.find(id))
        .set((
            lotes::status.eq(status.as_str()),
            lotes::atualizado_por.eq(Some(atualizado_por)),
            lotes::atualizado_em.eq(Some(Utc::now().naive_utc())),
        ))
        .execute(conn)?)
}

/// Items go with the lote through the `ON DELETE CASCADE` foreign key.
pub fn delete_lote(conn: &mut SqliteConnection, id: i32) -> LoteStoreResult<usize> {
    Ok(diesel::delete(lotes::table.find(id)).execute(conn)?)
}

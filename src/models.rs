use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub cfc_name: Option<String>,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub require_password_change: bool,
}

/// A user row without the password hash, for listings.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
    pub role: String,
    pub cfc_name: Option<String>,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub require_password_change: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: String,
    pub role: &'a str,
    pub cfc_name: Option<&'a str>,
    pub name: &'a str,
    pub created_at: NaiveDateTime,
    pub require_password_change: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = lotes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LoteRow {
    pub id: i32,
    pub numero: String,
    pub tipo: String,
    pub status: String,
    pub criado_por: String,
    pub criado_em: NaiveDateTime,
    pub atualizado_por: Option<String>,
    pub atualizado_em: Option<NaiveDateTime>,
    pub pdf_filename: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = lotes)]
pub struct NewLoteRow<'a> {
    pub numero: &'a str,
    pub tipo: &'a str,
    pub status: &'a str,
    pub criado_por: &'a str,
    pub criado_em: NaiveDateTime,
    pub pdf_filename: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = lote_items)]
#[diesel(belongs_to(LoteRow, foreign_key = lote_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LoteItemRow {
    pub id: i32,
    pub lote_id: i32,
    pub nome: String,
    pub cfc: Option<String>,
    pub tipo: String,
    pub numero_documento: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = lote_items)]
pub struct NewLoteItemRow<'a> {
    pub lote_id: i32,
    pub nome: &'a str,
    pub cfc: Option<&'a str>,
    pub tipo: &'a str,
    pub numero_documento: &'a str,
}

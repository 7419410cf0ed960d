//! Catalog SQL behind live introspection. Everything is scoped to the
//! `public` schema; the migration ledger is filtered out by the
//! describer, not the queries.

pub(crate) const TABLE_NAMES_QUERY: &str = "\
SELECT table_name \
FROM information_schema.tables \
WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
ORDER BY table_name";

pub(crate) const TABLE_COLUMNS_QUERY: &str = "\
SELECT column_name, data_type, udt_name, is_nullable, column_default \
FROM information_schema.columns \
WHERE table_schema = 'public' AND table_name = $1 \
ORDER BY ordinal_position";

pub(crate) const PRIMARY_KEY_QUERY: &str = "\
SELECT kcu.column_name \
FROM information_schema.table_constraints tc \
JOIN information_schema.key_column_usage kcu \
  ON kcu.constraint_name = tc.constraint_name \
 AND kcu.table_schema = tc.table_schema \
WHERE tc.table_schema = 'public' \
  AND tc.table_name = $1 \
  AND tc.constraint_type = 'PRIMARY KEY' \
ORDER BY kcu.ordinal_position";

pub(crate) const INDEXES_QUERY: &str = "\
SELECT i.relname AS index_name, \
       a.attname AS column_name, \
       ix.indisunique AS is_unique, \
       array_position(ix.indkey, a.attnum) AS ordinal \
FROM pg_class t \
JOIN pg_namespace n ON n.oid = t.relnamespace \
JOIN pg_index ix ON ix.indrelid = t.oid \
JOIN pg_class i ON i.oid = ix.indexrelid \
JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
WHERE n.nspname = 'public' \
  AND t.relname = $1 \
  AND NOT ix.indisprimary \
ORDER BY i.relname, ordinal";

pub(crate) const FOREIGN_KEYS_QUERY: &str = "\
SELECT tc.constraint_name, \
       kcu.column_name, \
       ccu.table_name AS referenced_table, \
       ccu.column_name AS referenced_column, \
       rc.delete_rule, \
       rc.update_rule, \
       kcu.ordinal_position \
FROM information_schema.table_constraints tc \
JOIN information_schema.key_column_usage kcu \
  ON kcu.constraint_name = tc.constraint_name \
 AND kcu.table_schema = tc.table_schema \
JOIN information_schema.referential_constraints rc \
  ON rc.constraint_name = tc.constraint_name \
 AND rc.constraint_schema = tc.table_schema \
JOIN information_schema.constraint_column_usage ccu \
  ON ccu.constraint_name = tc.constraint_name \
 AND ccu.table_schema = tc.table_schema \
WHERE tc.table_schema = 'public' \
  AND tc.table_name = $1 \
  AND tc.constraint_type = 'FOREIGN KEY' \
ORDER BY tc.constraint_name, kcu.ordinal_position";

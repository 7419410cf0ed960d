//! Catalog SQL behind live introspection, all scoped to the connected
//! database via `DATABASE()`.

pub(crate) const TABLE_NAMES_QUERY: &str = "\
SELECT TABLE_NAME AS table_name \
FROM information_schema.TABLES \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
ORDER BY TABLE_NAME";

pub(crate) const TABLE_COLUMNS_QUERY: &str = "\
SELECT COLUMN_NAME AS column_name, \
       COLUMN_TYPE AS column_type, \
       IS_NULLABLE AS is_nullable, \
       COLUMN_DEFAULT AS column_default, \
       EXTRA AS extra \
FROM information_schema.COLUMNS \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
ORDER BY ORDINAL_POSITION";

pub(crate) const PRIMARY_KEY_QUERY: &str = "\
SELECT COLUMN_NAME AS column_name \
FROM information_schema.KEY_COLUMN_USAGE \
WHERE TABLE_SCHEMA = DATABASE() \
  AND TABLE_NAME = ? \
  AND CONSTRAINT_NAME = 'PRIMARY' \
ORDER BY ORDINAL_POSITION";

pub(crate) const INDEXES_QUERY: &str = "\
SELECT INDEX_NAME AS index_name, \
       COLUMN_NAME AS column_name, \
       NON_UNIQUE AS non_unique, \
       SEQ_IN_INDEX AS ordinal \
FROM information_schema.STATISTICS \
WHERE TABLE_SCHEMA = DATABASE() \
  AND TABLE_NAME = ? \
  AND INDEX_NAME <> 'PRIMARY' \
ORDER BY INDEX_NAME, SEQ_IN_INDEX";

pub(crate) const FOREIGN_KEYS_QUERY: &str = "\
SELECT kcu.CONSTRAINT_NAME AS constraint_name, \
       kcu.COLUMN_NAME AS column_name, \
       kcu.REFERENCED_TABLE_NAME AS referenced_table, \
       kcu.REFERENCED_COLUMN_NAME AS referenced_column, \
       rc.DELETE_RULE AS delete_rule, \
       rc.UPDATE_RULE AS update_rule \
FROM information_schema.KEY_COLUMN_USAGE kcu \
JOIN information_schema.REFERENTIAL_CONSTRAINTS rc \
  ON rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
 AND rc.CONSTRAINT_SCHEMA = kcu.TABLE_SCHEMA \
WHERE kcu.TABLE_SCHEMA = DATABASE() \
  AND kcu.TABLE_NAME = ? \
  AND kcu.REFERENCED_TABLE_NAME IS NOT NULL \
ORDER BY kcu.CONSTRAINT_NAME, kcu.ORDINAL_POSITION";

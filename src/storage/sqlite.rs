use super::{Inserted, Storage};
use crate::auth::generate_token;
use crate::domain::*;
use crate::error::{FoodgramError, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info};

const SCHEMA: &str = include_str!("schema.sql");

const USER_COLUMNS: &str =
    "u.id, u.email, u.username, u.first_name, u.last_name, u.is_staff, u.date_joined";
const RECIPE_COLUMNS: &str = "r.id, r.name, r.image, r.text, r.cooking_time, r.pub_date, \
     u.id, u.email, u.username, u.first_name, u.last_name, u.is_staff, u.date_joined";
const RECIPE_FROM: &str = "FROM recipes r JOIN users u ON u.id = r.author_id";
const RECIPE_ORDER: &str = "ORDER BY r.pub_date DESC, r.id DESC";

/// Extended result code for a failed `FOREIGN KEY` constraint.
const SQLITE_CONSTRAINT_FOREIGNKEY: i32 = 787;

/// SQLite-backed storage. A single connection is shared behind a mutex.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` on the shared connection. On a multi-threaded runtime the
    /// blocking SQLite call is moved off the async worker with
    /// `block_in_place`.
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let run = || {
            let mut conn = self.conn.lock().map_err(|_| FoodgramError::Lock)?;
            f(&mut conn)
        };
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(run)
            }
            _ => run(),
        }
    }
}

/// Maps an `INSERT OR IGNORE` outcome. Ignored rows already existed; a
/// foreign key failure means the referenced row is gone.
fn insert_outcome(result: rusqlite::Result<usize>) -> Result<Inserted> {
    match result {
        Ok(0) => Ok(Inserted::AlreadyExists),
        Ok(_) => Ok(Inserted::Created),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            Ok(Inserted::Missing)
        }
        Err(e) => Err(e.into()),
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn user_from_row(row: &Row, offset: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(offset)?,
        email: row.get(offset + 1)?,
        username: row.get(offset + 2)?,
        first_name: row.get(offset + 3)?,
        last_name: row.get(offset + 4)?,
        is_staff: row.get(offset + 5)?,
        date_joined: parse_time(row, offset + 6)?,
    })
}

fn tag_from_row(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        slug: row.get(3)?,
    })
}

fn ingredient_from_row(row: &Row) -> rusqlite::Result<Ingredient> {
    Ok(Ingredient {
        id: row.get(0)?,
        name: row.get(1)?,
        measurement_unit: row.get(2)?,
    })
}

/// Recipe row without tags and ingredients; see [`hydrate`].
fn recipe_from_row(row: &Row) -> rusqlite::Result<Recipe> {
    Ok(Recipe {
        id: row.get(0)?,
        name: row.get(1)?,
        image: row.get(2)?,
        text: row.get(3)?,
        cooking_time: row.get(4)?,
        pub_date: parse_time(row, 5)?,
        author: user_from_row(row, 6)?,
        tags: Vec::new(),
        ingredients: Vec::new(),
    })
}

fn hydrate(conn: &Connection, recipes: &mut [Recipe]) -> Result<()> {
    let mut tags_stmt = conn.prepare_cached(
        "SELECT t.id, t.name, t.color, t.slug FROM recipe_tags rt
         JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = ?1 ORDER BY t.id",
    )?;
    let mut ingredients_stmt = conn.prepare_cached(
        "SELECT i.id, i.name, i.measurement_unit, ri.amount FROM recipe_ingredients ri
         JOIN ingredients i ON i.id = ri.ingredient_id WHERE ri.recipe_id = ?1 ORDER BY ri.id",
    )?;
    for recipe in recipes.iter_mut() {
        recipe.tags = tags_stmt
            .query_map(params![recipe.id], tag_from_row)?
            .collect::<rusqlite::Result<_>>()?;
        recipe.ingredients = ingredients_stmt
            .query_map(params![recipe.id], |row| {
                Ok(RecipeIngredient {
                    ingredient: ingredient_from_row(row)?,
                    amount: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;
    }
    Ok(())
}

fn query_recipes(conn: &Connection, sql: &str, values: &[Value]) -> Result<Vec<Recipe>> {
    let mut stmt = conn.prepare(sql)?;
    let mut recipes = stmt
        .query_map(params_from_iter(values.iter()), recipe_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    hydrate(conn, &mut recipes)?;
    Ok(recipes)
}

fn query_users(conn: &Connection, sql: &str, values: &[Value]) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(sql)?;
    let users = stmt
        .query_map(params_from_iter(values.iter()), |row| user_from_row(row, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

fn count(conn: &Connection, sql: &str, values: &[Value]) -> Result<usize> {
    let n: i64 = conn.query_row(sql, params_from_iter(values.iter()), |row| row.get(0))?;
    Ok(n as usize)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// WHERE clause and bound values for a recipe filter.
fn recipe_conditions(filter: &RecipeFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(author) = filter.author {
        clauses.push("r.author_id = ?".to_string());
        values.push(Value::Integer(author));
    }
    if !filter.tags.is_empty() {
        clauses.push(format!(
            "r.id IN (SELECT rt.recipe_id FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
             WHERE t.slug IN ({}))",
            placeholders(filter.tags.len())
        ));
        values.extend(filter.tags.iter().cloned().map(Value::Text));
    }
    if let Some(viewer) = filter.viewer {
        for (wanted, list) in [
            (filter.is_favorited, RecipeList::Favorites),
            (filter.is_in_shopping_cart, RecipeList::ShoppingCart),
        ] {
            if let Some(wanted) = wanted {
                let op = if wanted { "IN" } else { "NOT IN" };
                clauses.push(format!(
                    "r.id {op} (SELECT recipe_id FROM {} WHERE user_id = ?)",
                    list.table()
                ));
                values.push(Value::Integer(viewer));
            }
        }
    }

    let clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    (clause, values)
}

fn insert_recipe_relations(conn: &Connection, id: RecipeId, draft: &RecipeDraft) -> Result<()> {
    let mut tag_stmt =
        conn.prepare_cached("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES (?1, ?2)")?;
    for tag in &draft.tags {
        tag_stmt.execute(params![id, tag])?;
    }
    let mut ingredient_stmt = conn.prepare_cached(
        "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES (?1, ?2, ?3)",
    )?;
    for (ingredient, amount) in &draft.ingredients {
        ingredient_stmt.execute(params![id, ingredient, amount])?;
    }
    Ok(())
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_user(&self, user: &NewUser) -> Result<User> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (email, username, first_name, last_name, password_hash, date_joined)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.email,
                    user.username,
                    user.first_name,
                    user.last_name,
                    user.password_hash,
                    now()
                ],
            )?;
            let id = conn.last_insert_rowid();
            debug!("Created user: {} with id {}", user.username, id);
            let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
            Ok(conn.query_row(&sql, params![id], |row| user_from_row(row, 0))?)
        })
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
            Ok(conn
                .query_row(&sql, params![id], |row| user_from_row(row, 0))
                .optional()?)
        })
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = ?1");
            Ok(conn
                .query_row(&sql, params![email], |row| user_from_row(row, 0))
                .optional()?)
        })
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?1");
            Ok(conn
                .query_row(&sql, params![username], |row| user_from_row(row, 0))
                .optional()?)
        })
    }

    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT password_hash FROM users WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    async fn set_password_hash(&self, id: UserId, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                params![password_hash, id],
            )?;
            Ok(())
        })
    }

    async fn list_users(&self, window: Window) -> Result<Paged<User>> {
        self.with_conn(|conn| {
            let total = count(conn, "SELECT COUNT(*) FROM users", &[])?;
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u ORDER BY u.username, u.id LIMIT ? OFFSET ?"
            );
            let items = query_users(
                conn,
                &sql,
                &[
                    Value::Integer(window.limit as i64),
                    Value::Integer(window.offset as i64),
                ],
            )?;
            Ok(Paged { count: total, items })
        })
    }

    async fn get_or_create_token(&self, user_id: UserId) -> Result<String> {
        self.with_conn(|conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT key FROM auth_tokens WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(key) = existing {
                return Ok(key);
            }
            let key = generate_token();
            conn.execute(
                "INSERT INTO auth_tokens (key, user_id, created) VALUES (?1, ?2, ?3)",
                params![key, user_id, now()],
            )?;
            debug!("Issued token for user {}", user_id);
            Ok(key)
        })
    }

    async fn get_user_by_token(&self, key: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM auth_tokens a JOIN users u ON u.id = a.user_id WHERE a.key = ?1"
            );
            Ok(conn
                .query_row(&sql, params![key], |row| user_from_row(row, 0))
                .optional()?)
        })
    }

    async fn delete_token(&self, user_id: UserId) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM auth_tokens WHERE user_id = ?1", params![user_id])?;
            Ok(())
        })
    }

    async fn subscribe(&self, user_id: UserId, author_id: UserId) -> Result<Inserted> {
        self.with_conn(|conn| {
            insert_outcome(conn.execute(
                "INSERT OR IGNORE INTO subscriptions (user_id, author_id) VALUES (?1, ?2)",
                params![user_id, author_id],
            ))
        })
    }

    async fn unsubscribe(&self, user_id: UserId, author_id: UserId) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM subscriptions WHERE user_id = ?1 AND author_id = ?2",
                params![user_id, author_id],
            )?;
            Ok(changed > 0)
        })
    }

    async fn is_subscribed(&self, user_id: UserId, author_id: UserId) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT 1 FROM subscriptions WHERE user_id = ?1 AND author_id = ?2",
                    params![user_id, author_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some())
        })
    }

    async fn list_subscriptions(&self, user_id: UserId, window: Window) -> Result<Paged<User>> {
        self.with_conn(|conn| {
            let total = count(
                conn,
                "SELECT COUNT(*) FROM subscriptions WHERE user_id = ?",
                &[Value::Integer(user_id)],
            )?;
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM subscriptions s JOIN users u ON u.id = s.author_id
                 WHERE s.user_id = ? ORDER BY u.username, u.id LIMIT ? OFFSET ?"
            );
            let items = query_users(
                conn,
                &sql,
                &[
                    Value::Integer(user_id),
                    Value::Integer(window.limit as i64),
                    Value::Integer(window.offset as i64),
                ],
            )?;
            Ok(Paged { count: total, items })
        })
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, color, slug FROM tags ORDER BY id")?;
            let tags = stmt
                .query_map([], tag_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tags)
        })
    }

    async fn get_tag(&self, id: TagId) -> Result<Option<Tag>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, color, slug FROM tags WHERE id = ?1",
                    params![id],
                    tag_from_row,
                )
                .optional()?)
        })
    }

    async fn missing_tags(&self, ids: &[TagId]) -> Result<Vec<TagId>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT 1 FROM tags WHERE id = ?1")?;
            let mut missing = Vec::new();
            for id in ids {
                if !stmt.exists(params![id])? {
                    missing.push(*id);
                }
            }
            Ok(missing)
        })
    }

    async fn missing_tag_slugs(&self, slugs: &[String]) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT 1 FROM tags WHERE slug = ?1")?;
            let mut missing = Vec::new();
            for slug in slugs {
                if !stmt.exists(params![slug])? {
                    missing.push(slug.clone());
                }
            }
            Ok(missing)
        })
    }

    async fn create_tags(&self, tags: &[NewTag]) -> Result<usize> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare("INSERT INTO tags (name, color, slug) VALUES (?1, ?2, ?3)")?;
                for tag in tags {
                    stmt.execute(params![tag.name, tag.color, tag.slug])?;
                }
            }
            tx.commit()?;
            Ok(tags.len())
        })
    }

    async fn list_ingredients(&self) -> Result<Vec<Ingredient>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, measurement_unit FROM ingredients ORDER BY name, id",
            )?;
            let ingredients = stmt
                .query_map([], ingredient_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ingredients)
        })
    }

    async fn get_ingredient(&self, id: IngredientId) -> Result<Option<Ingredient>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, measurement_unit FROM ingredients WHERE id = ?1",
                    params![id],
                    ingredient_from_row,
                )
                .optional()?)
        })
    }

    async fn get_ingredients(&self, ids: &[IngredientId]) -> Result<Vec<Ingredient>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, name, measurement_unit FROM ingredients WHERE id = ?1",
            )?;
            let mut found = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(ingredient) = stmt
                    .query_row(params![id], ingredient_from_row)
                    .optional()?
                {
                    found.push(ingredient);
                }
            }
            Ok(found)
        })
    }

    async fn create_ingredients(&self, ingredients: &[NewIngredient]) -> Result<usize> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO ingredients (name, measurement_unit) VALUES (?1, ?2)",
                )?;
                for ingredient in ingredients {
                    stmt.execute(params![ingredient.name, ingredient.measurement_unit])?;
                }
            }
            tx.commit()?;
            Ok(ingredients.len())
        })
    }

    async fn create_recipe(&self, author_id: UserId, draft: &RecipeDraft) -> Result<RecipeId> {
        let image = draft
            .image
            .as_deref()
            .ok_or_else(|| FoodgramError::Image("recipe image is required".to_string()))?;
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO recipes (author_id, name, image, text, cooking_time, pub_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![author_id, draft.name, image, draft.text, draft.cooking_time, now()],
            )?;
            let id = tx.last_insert_rowid();
            insert_recipe_relations(&tx, id, draft)?;
            tx.commit()?;
            debug!("Created recipe: {} with id {}", draft.name, id);
            Ok(id)
        })
    }

    async fn update_recipe(&self, id: RecipeId, draft: &RecipeDraft) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let previous: String = tx.query_row(
                "SELECT image FROM recipes WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            tx.execute(
                "UPDATE recipes SET name = ?1, text = ?2, cooking_time = ?3,
                 image = COALESCE(?4, image) WHERE id = ?5",
                params![draft.name, draft.text, draft.cooking_time, draft.image, id],
            )?;
            tx.execute("DELETE FROM recipe_tags WHERE recipe_id = ?1", params![id])?;
            tx.execute("DELETE FROM recipe_ingredients WHERE recipe_id = ?1", params![id])?;
            insert_recipe_relations(&tx, id, draft)?;
            tx.commit()?;
            debug!("Updated recipe: {} with id {}", draft.name, id);
            Ok(draft.image.as_ref().map(|_| previous))
        })
    }

    async fn delete_recipe(&self, id: RecipeId) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
    }

    async fn get_recipe(&self, id: RecipeId) -> Result<Option<Recipe>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {RECIPE_COLUMNS} {RECIPE_FROM} WHERE r.id = ?");
            Ok(query_recipes(conn, &sql, &[Value::Integer(id)])?.pop())
        })
    }

    async fn list_recipes(&self, filter: &RecipeFilter, window: Window) -> Result<Paged<Recipe>> {
        self.with_conn(|conn| {
            let (clause, mut values) = recipe_conditions(filter);
            let total = count(conn, &format!("SELECT COUNT(*) FROM recipes r {clause}"), &values)?;
            values.push(Value::Integer(window.limit as i64));
            values.push(Value::Integer(window.offset as i64));
            let sql = format!(
                "SELECT {RECIPE_COLUMNS} {RECIPE_FROM} {clause} {RECIPE_ORDER} LIMIT ? OFFSET ?"
            );
            let items = query_recipes(conn, &sql, &values)?;
            Ok(Paged { count: total, items })
        })
    }

    async fn recipes_by_author(&self, author_id: UserId, limit: Option<usize>) -> Result<Vec<Recipe>> {
        self.with_conn(|conn| {
            // SQLite treats a negative LIMIT as unbounded
            let limit = limit.map(|l| l as i64).unwrap_or(-1);
            let sql = format!(
                "SELECT {RECIPE_COLUMNS} {RECIPE_FROM} WHERE r.author_id = ? {RECIPE_ORDER} LIMIT ?"
            );
            query_recipes(conn, &sql, &[Value::Integer(author_id), Value::Integer(limit)])
        })
    }

    async fn count_recipes_by_author(&self, author_id: UserId) -> Result<usize> {
        self.with_conn(|conn| {
            count(
                conn,
                "SELECT COUNT(*) FROM recipes WHERE author_id = ?",
                &[Value::Integer(author_id)],
            )
        })
    }

    async fn add_to_list(&self, list: RecipeList, user_id: UserId, recipe_id: RecipeId) -> Result<Inserted> {
        self.with_conn(|conn| {
            let sql = format!(
                "INSERT OR IGNORE INTO {} (user_id, recipe_id) VALUES (?1, ?2)",
                list.table()
            );
            insert_outcome(conn.execute(&sql, params![user_id, recipe_id]))
        })
    }

    async fn remove_from_list(&self, list: RecipeList, user_id: UserId, recipe_id: RecipeId) -> Result<bool> {
        self.with_conn(|conn| {
            let sql = format!(
                "DELETE FROM {} WHERE user_id = ?1 AND recipe_id = ?2",
                list.table()
            );
            Ok(conn.execute(&sql, params![user_id, recipe_id])? > 0)
        })
    }

    async fn in_list(&self, list: RecipeList, user_id: UserId, recipe_id: RecipeId) -> Result<bool> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT 1 FROM {} WHERE user_id = ?1 AND recipe_id = ?2",
                list.table()
            );
            Ok(conn.prepare(&sql)?.exists(params![user_id, recipe_id])?)
        })
    }

    async fn shopping_cart_recipes(&self, user_id: UserId) -> Result<Vec<Recipe>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {RECIPE_COLUMNS} {RECIPE_FROM}
                 WHERE r.id IN (SELECT recipe_id FROM shopping_cart WHERE user_id = ?) {RECIPE_ORDER}"
            );
            query_recipes(conn, &sql, &[Value::Integer(user_id)])
        })
    }

    async fn shopping_cart_totals(&self, user_id: UserId) -> Result<Vec<IngredientTotal>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT i.name, i.measurement_unit, SUM(ri.amount)
                 FROM shopping_cart sc
                 JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
                 JOIN ingredients i ON i.id = ri.ingredient_id
                 WHERE sc.user_id = ?1
                 GROUP BY i.id
                 ORDER BY i.name, i.measurement_unit",
            )?;
            let totals = stmt
                .query_map(params![user_id], |row| {
                    Ok(IngredientTotal {
                        name: row.get(0)?,
                        measurement_unit: row.get(1)?,
                        total_amount: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(totals)
        })
    }

    async fn cooking_times(&self) -> Result<Vec<(RecipeId, String, i64)>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, cooking_time FROM recipes ORDER BY cooking_time, id")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    async fn users_by_subscriptions(&self, filter: SubscriptionFilter) -> Result<Vec<User>> {
        let link = match filter {
            SubscriptionFilter::HasSubscriptions => "s.user_id",
            SubscriptionFilter::HasSubscribers => "s.author_id",
        };
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users u
                 WHERE EXISTS (SELECT 1 FROM subscriptions s WHERE {link} = u.id)
                 ORDER BY u.username, u.id"
            );
            query_users(conn, &sql, &[])
        })
    }

    async fn favorite_counts(&self) -> Result<Vec<FavoriteCount>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.name, u.username, COUNT(f.user_id)
                 FROM recipes r
                 JOIN users u ON u.id = r.author_id
                 LEFT JOIN favorites f ON f.recipe_id = r.id
                 GROUP BY r.id
                 ORDER BY COUNT(f.user_id) DESC, r.name, r.id",
            )?;
            let counts = stmt
                .query_map([], |row| {
                    Ok(FavoriteCount {
                        recipe_id: row.get(0)?,
                        name: row.get(1)?,
                        author: row.get(2)?,
                        favorited: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(counts)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            email: format!("{name}@example.com"),
            username: name.to_string(),
            first_name: "First".to_string(),
            last_name: "Last".to_string(),
            password_hash: "sha256$1$salt$digest".to_string(),
        }
    }

    async fn seeded() -> (SqliteStorage, User, User) {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let alice = storage.create_user(&new_user("alice")).await.unwrap();
        let bob = storage.create_user(&new_user("bob")).await.unwrap();
        storage
            .create_tags(&[
                NewTag { name: "Breakfast".into(), color: "#E26C2D".into(), slug: "breakfast".into() },
                NewTag { name: "Dinner".into(), color: "#49B64E".into(), slug: "dinner".into() },
            ])
            .await
            .unwrap();
        storage
            .create_ingredients(&[
                NewIngredient { name: "flour".into(), measurement_unit: "g".into() },
                NewIngredient { name: "egg".into(), measurement_unit: "pcs".into() },
                NewIngredient { name: "milk".into(), measurement_unit: "ml".into() },
            ])
            .await
            .unwrap();
        (storage, alice, bob)
    }

    fn draft(name: &str, tags: Vec<TagId>, ingredients: Vec<(IngredientId, i64)>) -> RecipeDraft {
        RecipeDraft {
            name: name.to_string(),
            text: "Mix and cook.".to_string(),
            cooking_time: 20,
            image: Some("recipes/images/x.png".to_string()),
            tags,
            ingredients,
        }
    }

    #[tokio::test]
    async fn recipe_round_trip_keeps_relations_in_order() {
        let (storage, alice, _) = seeded().await;
        let id = storage
            .create_recipe(alice.id, &draft("Pancakes", vec![2, 1], vec![(3, 200), (1, 150)]))
            .await
            .unwrap();

        let recipe = storage.get_recipe(id).await.unwrap().unwrap();
        assert_eq!(recipe.author.username, "alice");
        assert_eq!(recipe.tags.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(
            recipe
                .ingredients
                .iter()
                .map(|i| (i.ingredient.name.as_str(), i.amount))
                .collect::<Vec<_>>(),
            vec![("milk", 200), ("flour", 150)]
        );
    }

    #[tokio::test]
    async fn update_replaces_relations_and_reports_old_image() {
        let (storage, alice, _) = seeded().await;
        let id = storage
            .create_recipe(alice.id, &draft("Pancakes", vec![1], vec![(1, 100)]))
            .await
            .unwrap();

        let mut changed = draft("Crepes", vec![2], vec![(2, 3)]);
        changed.image = None;
        assert_eq!(storage.update_recipe(id, &changed).await.unwrap(), None);
        let recipe = storage.get_recipe(id).await.unwrap().unwrap();
        assert_eq!(recipe.name, "Crepes");
        assert_eq!(recipe.image, "recipes/images/x.png");
        assert_eq!(recipe.tags[0].slug, "dinner");
        assert_eq!(recipe.ingredients.len(), 1);

        changed.image = Some("recipes/images/y.png".to_string());
        assert_eq!(
            storage.update_recipe(id, &changed).await.unwrap().as_deref(),
            Some("recipes/images/x.png")
        );
    }

    #[tokio::test]
    async fn filters_combine() {
        let (storage, alice, bob) = seeded().await;
        let breakfast = storage
            .create_recipe(alice.id, &draft("Omelette", vec![1], vec![(2, 3)]))
            .await
            .unwrap();
        let dinner = storage
            .create_recipe(bob.id, &draft("Pasta", vec![2], vec![(1, 300)]))
            .await
            .unwrap();
        storage.add_to_list(RecipeList::Favorites, bob.id, breakfast).await.unwrap();

        let window = Window { limit: 10, offset: 0 };
        let all = storage.list_recipes(&RecipeFilter::default(), window).await.unwrap();
        assert_eq!(all.count, 2);
        assert_eq!(all.items[0].id, dinner, "newest first");

        let by_tag = RecipeFilter { tags: vec!["breakfast".into(), "dinner".into()], ..Default::default() };
        assert_eq!(storage.list_recipes(&by_tag, window).await.unwrap().count, 2);

        let by_author = RecipeFilter { author: Some(bob.id), ..Default::default() };
        let found = storage.list_recipes(&by_author, window).await.unwrap();
        assert_eq!(found.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![dinner]);

        let favorited = RecipeFilter { is_favorited: Some(true), viewer: Some(bob.id), ..Default::default() };
        let found = storage.list_recipes(&favorited, window).await.unwrap();
        assert_eq!(found.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![breakfast]);

        let not_favorited = RecipeFilter { is_favorited: Some(false), viewer: Some(bob.id), ..Default::default() };
        let found = storage.list_recipes(&not_favorited, window).await.unwrap();
        assert_eq!(found.items.iter().map(|r| r.id).collect::<Vec<_>>(), vec![dinner]);

        let anonymous = RecipeFilter { is_favorited: Some(true), ..Default::default() };
        assert_eq!(storage.list_recipes(&anonymous, window).await.unwrap().count, 2);
    }

    #[tokio::test]
    async fn shopping_cart_totals_sum_across_recipes() {
        let (storage, alice, bob) = seeded().await;
        let a = storage
            .create_recipe(alice.id, &draft("Pancakes", vec![1], vec![(1, 200), (2, 2)]))
            .await
            .unwrap();
        let b = storage
            .create_recipe(alice.id, &draft("Bread", vec![2], vec![(1, 500)]))
            .await
            .unwrap();
        storage.add_to_list(RecipeList::ShoppingCart, bob.id, a).await.unwrap();
        storage.add_to_list(RecipeList::ShoppingCart, bob.id, b).await.unwrap();

        let totals = storage.shopping_cart_totals(bob.id).await.unwrap();
        assert_eq!(
            totals,
            vec![
                IngredientTotal { name: "egg".into(), measurement_unit: "pcs".into(), total_amount: 2 },
                IngredientTotal { name: "flour".into(), measurement_unit: "g".into(), total_amount: 700 },
            ]
        );
        assert!(storage.shopping_cart_totals(alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_membership_is_unique() {
        let (storage, alice, bob) = seeded().await;
        let id = storage
            .create_recipe(alice.id, &draft("Pancakes", vec![1], vec![(1, 1)]))
            .await
            .unwrap();
        let list = RecipeList::Favorites;
        assert_eq!(storage.add_to_list(list, bob.id, id).await.unwrap(), Inserted::Created);
        assert_eq!(storage.add_to_list(list, bob.id, id).await.unwrap(), Inserted::AlreadyExists);
        assert!(storage.in_list(list, bob.id, id).await.unwrap());
        assert!(!storage.in_list(RecipeList::ShoppingCart, bob.id, id).await.unwrap());
        assert!(storage.remove_from_list(list, bob.id, id).await.unwrap());
        assert!(!storage.remove_from_list(list, bob.id, id).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_recipe_cascades() {
        let (storage, alice, bob) = seeded().await;
        let id = storage
            .create_recipe(alice.id, &draft("Pancakes", vec![1], vec![(1, 1)]))
            .await
            .unwrap();
        storage.add_to_list(RecipeList::ShoppingCart, bob.id, id).await.unwrap();
        assert!(storage.delete_recipe(id).await.unwrap());
        assert!(storage.get_recipe(id).await.unwrap().is_none());
        assert!(storage.shopping_cart_totals(bob.id).await.unwrap().is_empty());
        assert!(!storage.delete_recipe(id).await.unwrap());
    }

    #[tokio::test]
    async fn subscriptions_and_tokens() {
        let (storage, alice, bob) = seeded().await;
        assert_eq!(storage.subscribe(alice.id, bob.id).await.unwrap(), Inserted::Created);
        assert_eq!(storage.subscribe(alice.id, bob.id).await.unwrap(), Inserted::AlreadyExists);
        assert!(storage.is_subscribed(alice.id, bob.id).await.unwrap());
        assert!(!storage.is_subscribed(bob.id, alice.id).await.unwrap());

        let page = storage
            .list_subscriptions(alice.id, Window { limit: 10, offset: 0 })
            .await
            .unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.items[0].username, "bob");

        let token = storage.get_or_create_token(alice.id).await.unwrap();
        assert_eq!(storage.get_or_create_token(alice.id).await.unwrap(), token);
        assert_eq!(storage.get_user_by_token(&token).await.unwrap().unwrap().id, alice.id);
        storage.delete_token(alice.id).await.unwrap();
        assert!(storage.get_user_by_token(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn email_lookup_ignores_case() {
        let (storage, alice, _) = seeded().await;
        let found = storage.get_user_by_email("ALICE@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, alice.id);
    }

    #[tokio::test]
    async fn missing_ids_and_slugs_reported() {
        let (storage, _, _) = seeded().await;
        assert_eq!(storage.missing_tags(&[1, 7]).await.unwrap(), vec![7]);
        assert_eq!(
            storage.missing_tag_slugs(&["dinner".into(), "lunch".into()]).await.unwrap(),
            vec!["lunch".to_string()]
        );
        let found = storage.get_ingredients(&[3, 9, 1]).await.unwrap();
        assert_eq!(found.iter().map(|i| i.id).collect::<Vec<_>>(), vec![3, 1]);
    }

    #[tokio::test]
    async fn inserts_referring_to_deleted_rows_are_missing() {
        let (storage, alice, bob) = seeded().await;
        let id = storage
            .create_recipe(alice.id, &draft("Pancakes", vec![1], vec![(1, 1)]))
            .await
            .unwrap();
        assert!(storage.delete_recipe(id).await.unwrap());
        for list in [RecipeList::Favorites, RecipeList::ShoppingCart] {
            assert_eq!(storage.add_to_list(list, bob.id, id).await.unwrap(), Inserted::Missing);
        }
        assert_eq!(storage.subscribe(bob.id, 999).await.unwrap(), Inserted::Missing);
    }

    #[tokio::test]
    async fn recipes_by_author_respects_limit() {
        let (storage, alice, bob) = seeded().await;
        for name in ["First", "Second", "Third"] {
            storage
                .create_recipe(alice.id, &draft(name, vec![1], vec![(1, 1)]))
                .await
                .unwrap();
        }
        storage
            .create_recipe(bob.id, &draft("Other", vec![1], vec![(1, 1)]))
            .await
            .unwrap();

        let newest = storage.recipes_by_author(alice.id, Some(2)).await.unwrap();
        assert_eq!(
            newest.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["Third", "Second"]
        );
        assert_eq!(storage.recipes_by_author(alice.id, None).await.unwrap().len(), 3);
        assert_eq!(storage.count_recipes_by_author(alice.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn users_filtered_by_subscription_links() {
        let (storage, alice, bob) = seeded().await;
        storage.create_user(&new_user("carol")).await.unwrap();
        storage.subscribe(alice.id, bob.id).await.unwrap();

        let following = storage
            .users_by_subscriptions(SubscriptionFilter::HasSubscriptions)
            .await
            .unwrap();
        assert_eq!(following.iter().map(|u| u.id).collect::<Vec<_>>(), vec![alice.id]);

        let followed = storage
            .users_by_subscriptions(SubscriptionFilter::HasSubscribers)
            .await
            .unwrap();
        assert_eq!(followed.iter().map(|u| u.id).collect::<Vec<_>>(), vec![bob.id]);
    }

    #[tokio::test]
    async fn favorite_counts_include_unfavorited_recipes() {
        let (storage, alice, bob) = seeded().await;
        let carol = storage.create_user(&new_user("carol")).await.unwrap();
        let soup = storage
            .create_recipe(alice.id, &draft("Soup", vec![1], vec![(1, 1)]))
            .await
            .unwrap();
        let cake = storage
            .create_recipe(bob.id, &draft("Cake", vec![1], vec![(1, 1)]))
            .await
            .unwrap();
        for user in [bob.id, carol.id] {
            storage.add_to_list(RecipeList::Favorites, user, soup).await.unwrap();
        }
        storage.add_to_list(RecipeList::ShoppingCart, alice.id, cake).await.unwrap();

        let counts = storage.favorite_counts().await.unwrap();
        assert_eq!(
            counts,
            vec![
                FavoriteCount { recipe_id: soup, name: "Soup".into(), author: "alice".into(), favorited: 2 },
                FavoriteCount { recipe_id: cake, name: "Cake".into(), author: "bob".into(), favorited: 0 },
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn works_on_multi_threaded_runtime() {
        let (storage, alice, _) = seeded().await;
        assert_eq!(storage.get_user(alice.id).await.unwrap().unwrap().username, "alice");
        assert_eq!(storage.list_tags().await.unwrap().len(), 2);
    }
}

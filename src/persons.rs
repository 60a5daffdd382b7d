use std::collections::HashMap;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::{entities::person, error::AppResult, models::Person};

/// Read-only view of the rating participants seeded at deployment.
#[derive(Clone)]
pub struct PersonDirectory {
    db: DatabaseConnection,
}

impl PersonDirectory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn all(&self) -> AppResult<Vec<Person>> {
        let persons = person::Entity::find()
            .order_by_asc(person::Column::Code)
            .all(&self.db)
            .await?;
        Ok(persons.into_iter().map(Person::from).collect())
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Person>> {
        let person = person::Entity::find_by_id(id).one(&self.db).await?;
        Ok(person.map(Person::from))
    }

    pub async fn get_by_code(&self, code: &str) -> AppResult<Option<Person>> {
        let person = person::Entity::find()
            .filter(person::Column::Code.eq(code))
            .one(&self.db)
            .await?;
        Ok(person.map(Person::from))
    }

    pub async fn by_id(&self) -> AppResult<HashMap<Uuid, Person>> {
        Ok(self.all().await?.into_iter().map(|p| (p.id, p)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[tokio::test]
    async fn lists_seeded_persons_by_code() {
        let persons = PersonDirectory::new(test_db().await);
        let all = persons.all().await.unwrap();
        let codes: Vec<&str> = all.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(codes, ["A", "C", "D", "J"]);
    }

    #[tokio::test]
    async fn lookup_by_code_and_id() {
        let persons = PersonDirectory::new(test_db().await);

        let daniel = persons.get_by_code("D").await.unwrap().unwrap();
        assert_eq!(daniel.name, "Daniel");
        assert_eq!(persons.get_by_id(daniel.id).await.unwrap(), Some(daniel.clone()));
        assert_eq!(persons.by_id().await.unwrap().get(&daniel.id), Some(&daniel));

        assert!(persons.get_by_code("Z").await.unwrap().is_none());
        assert!(persons.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }
}

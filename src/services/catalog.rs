//! Catalog management service for books and categories

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookDetails, BookQuery, CreateBook, UpdateBook},
        category::{Category, CreateCategory, UpdateCategory},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    // ------------------------------------------------------------------
    // Books
    // ------------------------------------------------------------------

    /// Search books with filters
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<BookDetails>, i64)> {
        self.repository.books.search(query).await
    }

    /// Get book by ID
    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Create a new book
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if let Some(category_id) = book.category_id {
            self.repository.categories.get_by_id(category_id).await?;
        }

        self.repository.books.create(&book).await
    }

    /// Update a book via its typed patch struct
    pub async fn update_book(&self, id: i32, update: UpdateBook) -> AppResult<Book> {
        update
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if let Some(category_id) = update.category_id {
            self.repository.categories.get_by_id(category_id).await?;
        }

        if let Some(new_total) = update.total_copies {
            // cannot shrink below the number of copies currently on loan
            let book = self.repository.books.get_by_id(id).await?;
            let on_loan = book.total_copies - book.available_copies;
            if new_total < on_loan {
                return Err(AppError::Validation(format!(
                    "total_copies cannot be reduced below {} copies currently on loan",
                    on_loan
                )));
            }
        }

        self.repository.books.update(id, &update).await
    }

    /// Delete a book. Refused while non-returned loans reference it.
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.get_by_id(id).await?;

        let open_loans = self.repository.loans.count_open_for_book(id).await?;
        if open_loans > 0 {
            return Err(AppError::Conflict(format!(
                "Book {} has {} non-returned loan(s)",
                id, open_loans
            )));
        }

        self.repository.books.delete(id).await
    }

    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    /// List all categories
    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.repository.categories.list().await
    }

    /// Get category by ID
    pub async fn get_category(&self, id: i32) -> AppResult<Category> {
        self.repository.categories.get_by_id(id).await
    }

    /// Create a new category
    pub async fn create_category(&self, category: CreateCategory) -> AppResult<Category> {
        category
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if self
            .repository
            .categories
            .name_exists(&category.name, None)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "Category '{}' already exists",
                category.name
            )));
        }

        self.repository.categories.create(&category).await
    }

    /// Update a category
    pub async fn update_category(&self, id: i32, update: UpdateCategory) -> AppResult<Category> {
        update
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if let Some(ref name) = update.name {
            if self.repository.categories.name_exists(name, Some(id)).await? {
                return Err(AppError::Conflict(format!(
                    "Category '{}' already exists",
                    name
                )));
            }
        }

        self.repository.categories.update(id, &update).await
    }

    /// Delete a category. Refused while books reference it.
    pub async fn delete_category(&self, id: i32) -> AppResult<()> {
        self.repository.categories.get_by_id(id).await?;

        let books = self.repository.books.count_in_category(id).await?;
        if books > 0 {
            return Err(AppError::Conflict(format!(
                "Category {} still contains {} book(s)",
                id, books
            )));
        }

        self.repository.categories.delete(id).await
    }
}

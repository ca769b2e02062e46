//! Pagination over encrypted queries and scans.

use crate::client::EncryptedClient;
use crate::error::Result;
use veildb_core::{Item, Page, QueryRequest, ScanRequest};

/// Iterates pages of decrypted items, threading the store's
/// continuation token until the server reports no more, or the caller's
/// callback returns `false`.
#[derive(Debug)]
pub struct EncryptedPaginator<'a> {
    client: &'a EncryptedClient,
    next_token: Option<Item>,
}

impl<'a> EncryptedPaginator<'a> {
    pub(crate) fn new(client: &'a EncryptedClient) -> Self {
        Self {
            client,
            next_token: None,
        }
    }

    /// Run `request` page by page, invoking `page_fn` with each
    /// decrypted page and a last-page flag.
    pub async fn query_pages<F>(
        &mut self,
        table: &str,
        request: QueryRequest,
        mut page_fn: F,
    ) -> Result<()>
    where
        F: FnMut(&Page, bool) -> bool,
    {
        loop {
            let paged = request
                .clone()
                .with_exclusive_start_key(self.next_token.take());
            let page = self.client.query(table, paged).await?;

            let last_page = page.is_last_page();
            if !page_fn(&page, last_page) || last_page {
                break;
            }
            self.next_token = page.last_evaluated_key;
        }
        Ok(())
    }

    /// Scan counterpart of [`query_pages`](Self::query_pages).
    pub async fn scan_pages<F>(
        &mut self,
        table: &str,
        request: ScanRequest,
        mut page_fn: F,
    ) -> Result<()>
    where
        F: FnMut(&Page, bool) -> bool,
    {
        loop {
            let paged = request
                .clone()
                .with_exclusive_start_key(self.next_token.take());
            let page = self.client.scan(table, paged).await?;

            let last_page = page.is_last_page();
            if !page_fn(&page, last_page) || last_page {
                break;
            }
            self.next_token = page.last_evaluated_key;
        }
        Ok(())
    }
}

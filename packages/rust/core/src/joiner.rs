//! Relevance joiner.
//!
//! Reconciles three independently keyed inputs into the evaluation corpus:
//! 1. query table: `queryId → text`
//! 2. relevance table: `queryId → {docId}` (first-seen order, deduplicated)
//! 3. document stream: `docId → {title, body}`
//!
//! and emits the document set plus every query that has at least one
//! judgment, annotated with its relevant document ids.
//!
//! Relevant ids missing from the document stream are kept as-is: judgments
//! may point outside the locally materialized snapshot, and dropping them
//! would change the recall the harness measures. They are counted in
//! [`JoinReport::dangling_doc_refs`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use evalcorpus_materializer::STREAM_HEADER;
use evalcorpus_records::{Escaping, Record, RecordReader};
use evalcorpus_shared::{
    AnnotatedQuery, Corpus, Document, DocumentFields, EvalCorpusError, JoinReport, OrderedMap,
    OrderedSet, Query, RelevanceJudgment, Result,
};
use tracing::{debug, info, instrument, warn};

/// `queryId → text`, in table order.
pub type QueryTable = OrderedMap<String, String>;

/// `queryId → docIds`, both levels in first-seen order.
pub type RelevanceTable = OrderedMap<String, OrderedSet<String>>;

/// `docId → {title, body}`, in stream order.
pub type DocumentTable = OrderedMap<String, DocumentFields>;

// ---------------------------------------------------------------------------
// Inputs / outputs
// ---------------------------------------------------------------------------

/// Locations of the three join inputs.
#[derive(Debug, Clone)]
pub struct JoinInputs {
    /// Query table (`queryId\ttext`).
    pub queries: PathBuf,
    /// Relevance table (`queryId\tgroup\tdocId\tlabel`).
    pub relevance: PathBuf,
    /// Materialized document stream.
    pub documents: PathBuf,
}

impl JoinInputs {
    /// Inputs laid out as in a MIRACL checkout:
    ///
    /// ```text
    /// <root>/miracl-v1.0-<lang>/topics/topics.miracl-v1.0-<lang>-<split>.tsv
    /// <root>/miracl-v1.0-<lang>/qrels/qrels.miracl-v1.0-<lang>-<split>.tsv
    /// ```
    pub fn miracl(root: &Path, corpus: Corpus, split: &str, documents: PathBuf) -> Self {
        let release = format!("miracl-v1.0-{}", corpus.code());
        let base = root.join(&release);
        Self {
            queries: base
                .join("topics")
                .join(format!("topics.{release}-{split}.tsv")),
            relevance: base
                .join("qrels")
                .join(format!("qrels.{release}-{split}.tsv")),
            documents,
        }
    }
}

/// Relevance table plus how many rows repeated an earlier pair.
#[derive(Debug, Default)]
pub struct LoadedRelevance {
    pub judgments: RelevanceTable,
    pub duplicate_rows: usize,
}

/// Everything a join produces, held in memory until written.
#[derive(Debug)]
pub struct JoinOutput {
    pub documents: Vec<Document>,
    pub queries: Vec<AnnotatedQuery>,
    pub report: JoinReport,
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Load all three inputs from disk and join them.
///
/// Every input is fully parsed before this returns, so a malformed row or
/// duplicate key surfaces before any artifact can be written.
#[instrument(skip_all, fields(queries = %inputs.queries.display(), documents = %inputs.documents.display()))]
pub fn join(inputs: &JoinInputs) -> Result<JoinOutput> {
    let queries = load_queries(open(&inputs.queries)?, &label(&inputs.queries))?;
    let relevance = load_relevance(open(&inputs.relevance)?, &label(&inputs.relevance))?;
    let documents = load_documents(open(&inputs.documents)?, &label(&inputs.documents))?;

    Ok(join_tables(queries, relevance, documents))
}

/// Join already-loaded tables.
pub fn join_tables(
    queries: QueryTable,
    relevance: LoadedRelevance,
    documents: DocumentTable,
) -> JoinOutput {
    let annotated = emit_queries(&queries, &relevance.judgments);

    let dangling_doc_refs = annotated
        .iter()
        .flat_map(|q| q.relevant_docs.iter())
        .filter(|id| !documents.contains_key(id.as_str()))
        .count();
    if dangling_doc_refs > 0 {
        warn!(
            dangling_doc_refs,
            "relevant documents missing from the document stream were kept"
        );
    }

    let report = JoinReport {
        documents: documents.len(),
        queries_loaded: queries.len(),
        queries_emitted: annotated.len(),
        queries_without_judgments: queries.len() - annotated.len(),
        judgments: relevance.judgments.iter().map(|(_, docs)| docs.len()).sum(),
        duplicate_judgments: relevance.duplicate_rows,
        judged_queries_not_in_table: relevance
            .judgments
            .keys()
            .filter(|qid| !queries.contains_key(qid.as_str()))
            .count(),
        dangling_doc_refs,
    };

    info!(
        documents = report.documents,
        queries_emitted = report.queries_emitted,
        queries_without_judgments = report.queries_without_judgments,
        judgments = report.judgments,
        "join complete"
    );

    JoinOutput {
        documents: emit_documents(documents),
        queries: annotated,
        report,
    }
}

// ---------------------------------------------------------------------------
// Loaders
// ---------------------------------------------------------------------------

/// Parse the query table. Rows must have exactly two fields; ids are unique.
pub fn load_queries<R: BufRead>(reader: R, input: &str) -> Result<QueryTable> {
    let mut table = QueryTable::new();

    for record in RecordReader::new(reader, input, Escaping::None) {
        let record = record?;
        let row = record.row;
        let query = parse_query(record, input)?;
        if table.try_insert(query.id.clone(), query.text).is_err() {
            return Err(EvalCorpusError::duplicate(input, query.id, row));
        }
    }

    debug!(input, queries = table.len(), "loaded query table");
    Ok(table)
}

/// Parse the relevance table.
///
/// Only the first and third columns are used; the grouping and label
/// columns, and anything after them, are skipped positionally. Judgments for
/// queries absent from the query table are kept here and filtered at
/// emission.
pub fn load_relevance<R: BufRead>(reader: R, input: &str) -> Result<LoadedRelevance> {
    let mut loaded = LoadedRelevance::default();

    for record in RecordReader::new(reader, input, Escaping::None) {
        let judgment = parse_judgment(record?, input)?;
        let docs = loaded.judgments.entry_or_default(judgment.query_id);
        if !docs.insert(judgment.doc_id) {
            loaded.duplicate_rows += 1;
        }
    }

    debug!(
        input,
        queries = loaded.judgments.len(),
        duplicate_rows = loaded.duplicate_rows,
        "loaded relevance table"
    );
    Ok(loaded)
}

/// Parse the materialized document stream (header line required).
pub fn load_documents<R: BufRead>(reader: R, input: &str) -> Result<DocumentTable> {
    let mut records = RecordReader::new(reader, input, Escaping::Backslash);

    match records.next().transpose()? {
        Some(header) if header.fields == STREAM_HEADER => {}
        Some(header) => {
            return Err(EvalCorpusError::malformed(
                input,
                header.row,
                format!(
                    "expected header '{}', found '{}'",
                    STREAM_HEADER.join("\t"),
                    header.fields.join("\t")
                ),
            ));
        }
        None => {
            return Err(EvalCorpusError::malformed(
                input,
                1,
                "document stream is empty (missing header)",
            ));
        }
    }

    let mut table = DocumentTable::new();
    for record in records {
        let record = record?;
        let row = record.row;
        let [id, title, body] = record.into_fields::<3>(input)?;

        if table.try_insert(id.clone(), DocumentFields { title, body }).is_err() {
            return Err(EvalCorpusError::duplicate(input, id, row));
        }
    }

    debug!(input, documents = table.len(), "loaded document stream");
    Ok(table)
}

// ---------------------------------------------------------------------------
// Emission
// ---------------------------------------------------------------------------

/// One [`Document`] per table entry, in stream order.
pub fn emit_documents(documents: DocumentTable) -> Vec<Document> {
    documents
        .into_iter()
        .map(|(id, fields)| Document {
            id,
            title: fields.title,
            body: fields.body,
        })
        .collect()
}

/// Annotate every query that has at least one judgment, in query-table order.
///
/// Queries without judgments are omitted rather than emitted with an empty
/// list.
pub fn emit_queries(queries: &QueryTable, relevance: &RelevanceTable) -> Vec<AnnotatedQuery> {
    queries
        .iter()
        .filter_map(|(qid, text)| {
            let docs = relevance.get(qid.as_str()).filter(|d| !d.is_empty())?;
            Some(AnnotatedQuery {
                query: text.clone(),
                relevant_docs: docs.iter().cloned().collect(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_query(record: Record, input: &str) -> Result<Query> {
    let [id, text] = record.into_fields::<2>(input)?;
    Ok(Query { id, text })
}

fn parse_judgment(record: Record, input: &str) -> Result<RelevanceJudgment> {
    let [query_id, _group, doc_id] = record.into_leading::<3>(input)?;
    Ok(RelevanceJudgment { query_id, doc_id })
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| EvalCorpusError::io(path, e))
}

fn label(path: &Path) -> String {
    path.display().to_string()
}

use crate::achievements;
use crate::errors::{AppError, AppResult};
use crate::models::{AppSettings, Flashcard, FlashcardDeck, FlashcardTopic, ReviewResult, SaveCardPayload, SaveDeckPayload};
use crate::profile;
use crate::store::{list_docs, read_doc, DocPath, DocumentStore};
use chrono::{DateTime, Utc};
use serde_json::json;

fn topics_collection(uid: &str) -> DocPath {
    DocPath::user(uid).child("flashcard")
}

fn topic_path(uid: &str, topic_id: &str) -> DocPath {
    topics_collection(uid).child(topic_id)
}

fn decks_collection(uid: &str, topic_id: &str) -> DocPath {
    topic_path(uid, topic_id).child("decks")
}

fn deck_path(uid: &str, topic_id: &str, deck_id: &str) -> DocPath {
    decks_collection(uid, topic_id).child(deck_id)
}

fn cards_collection(uid: &str, topic_id: &str, deck_id: &str) -> DocPath {
    deck_path(uid, topic_id, deck_id).child("cards")
}

fn required(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required.", field)));
    }
    Ok(trimmed.to_string())
}

pub fn create_topic(store: &dyn DocumentStore, uid: &str, title: &str, now: DateTime<Utc>) -> AppResult<String> {
    let title = required(title, "Topic title")?;
    store.add(&topics_collection(uid), &json!({ "title": title, "createdAt": now }))
}

pub fn list_topics(store: &dyn DocumentStore, uid: &str) -> AppResult<Vec<FlashcardTopic>> {
    list_docs(store, &topics_collection(uid), None)
}

pub fn rename_topic(store: &dyn DocumentStore, uid: &str, topic_id: &str, title: &str) -> AppResult<()> {
    let title = required(title, "Topic title")?;
    store.merge(&topic_path(uid, topic_id), &json!({ "title": title }))
}

/// Removes the topic with every deck and card beneath it in one batch.
pub fn delete_topic(store: &dyn DocumentStore, uid: &str, topic_id: &str) -> AppResult<()> {
    let mut paths = Vec::new();
    for (deck_id, _) in store.list(&decks_collection(uid, topic_id), None)? {
        paths.extend(deck_subtree(store, uid, topic_id, &deck_id)?);
    }
    paths.push(topic_path(uid, topic_id));
    store.batch_delete(&paths)?;
    tracing::info!(uid, topic_id, documents = paths.len(), "flashcard topic deleted");
    Ok(())
}

fn deck_subtree(store: &dyn DocumentStore, uid: &str, topic_id: &str, deck_id: &str) -> AppResult<Vec<DocPath>> {
    let cards = cards_collection(uid, topic_id, deck_id);
    let mut paths = store
        .list(&cards, None)?
        .into_iter()
        .map(|(card_id, _)| cards.child(&card_id))
        .collect::<Vec<_>>();
    paths.push(deck_path(uid, topic_id, deck_id));
    Ok(paths)
}

/// Creating a deck bumps `decksCreated` through its own profile round trip.
pub fn create_deck(
    store: &dyn DocumentStore,
    uid: &str,
    topic_id: &str,
    payload: SaveDeckPayload,
    now: DateTime<Utc>,
) -> AppResult<String> {
    let title = required(&payload.title, "Deck title")?;
    if store.get(&topic_path(uid, topic_id))?.is_none() {
        return Err(AppError::NotFound(format!("topic {}", topic_id)));
    }
    let deck_id = store.add(
        &decks_collection(uid, topic_id),
        &json!({
            "topicId": topic_id,
            "title": title,
            "description": payload.description.trim(),
            "createdAt": now,
            "reviewed": false,
        }),
    )?;

    if profile::bump_counters(store, uid, &[("decksCreated", 1)])?.is_some() {
        achievements::evaluate_and_store(store, uid)?;
    }
    tracing::info!(uid, topic_id, deck_id = %deck_id, "deck created");
    Ok(deck_id)
}

pub fn list_decks(store: &dyn DocumentStore, uid: &str, topic_id: &str) -> AppResult<Vec<FlashcardDeck>> {
    list_docs(store, &decks_collection(uid, topic_id), None)
}

pub fn update_deck(
    store: &dyn DocumentStore,
    uid: &str,
    topic_id: &str,
    deck_id: &str,
    payload: SaveDeckPayload,
) -> AppResult<()> {
    let title = required(&payload.title, "Deck title")?;
    store.merge(
        &deck_path(uid, topic_id, deck_id),
        &json!({ "title": title, "description": payload.description.trim() }),
    )
}

pub fn delete_deck(store: &dyn DocumentStore, uid: &str, topic_id: &str, deck_id: &str) -> AppResult<()> {
    let paths = deck_subtree(store, uid, topic_id, deck_id)?;
    store.batch_delete(&paths)
}

pub fn add_card(
    store: &dyn DocumentStore,
    uid: &str,
    topic_id: &str,
    deck_id: &str,
    payload: SaveCardPayload,
) -> AppResult<String> {
    let question = required(&payload.question, "Question")?;
    let answer = required(&payload.answer, "Answer")?;
    store.add(
        &cards_collection(uid, topic_id, deck_id),
        &json!({ "question": question, "answer": answer }),
    )
}

/// Insertion order; there is no repetition schedule.
pub fn list_cards(store: &dyn DocumentStore, uid: &str, topic_id: &str, deck_id: &str) -> AppResult<Vec<Flashcard>> {
    list_docs(store, &cards_collection(uid, topic_id, deck_id), None)
}

pub fn update_card(
    store: &dyn DocumentStore,
    uid: &str,
    topic_id: &str,
    deck_id: &str,
    card_id: &str,
    payload: SaveCardPayload,
) -> AppResult<()> {
    let question = required(&payload.question, "Question")?;
    let answer = required(&payload.answer, "Answer")?;
    store.merge(
        &cards_collection(uid, topic_id, deck_id).child(card_id),
        &json!({ "question": question, "answer": answer }),
    )
}

pub fn delete_card(store: &dyn DocumentStore, uid: &str, topic_id: &str, deck_id: &str, card_id: &str) -> AppResult<()> {
    store.delete(&cards_collection(uid, topic_id, deck_id).child(card_id))
}

pub fn start_review(
    store: &dyn DocumentStore,
    settings: &AppSettings,
    uid: &str,
    topic_id: &str,
    deck_id: &str,
) -> AppResult<Vec<Flashcard>> {
    let cards = list_cards(store, uid, topic_id, deck_id)?;
    if cards.len() < settings.min_cards_to_review {
        return Err(AppError::Validation(format!(
            "You need at least {} cards to start a review.",
            settings.min_cards_to_review
        )));
    }
    Ok(cards)
}

/// Records a finished review: one profile round trip for the counters, and
/// a deck flag so the unique-deck counter moves once per deck.
pub fn finish_review(
    store: &dyn DocumentStore,
    uid: &str,
    topic_id: &str,
    result: &ReviewResult,
) -> AppResult<()> {
    if result.total == 0 || result.correct > result.total {
        return Err(AppError::Validation(format!(
            "invalid review score {}/{}",
            result.correct, result.total
        )));
    }
    let path = deck_path(uid, topic_id, &result.deck_id);
    let Some(deck) = read_doc::<FlashcardDeck>(store, &path)? else {
        return Err(AppError::NotFound(format!("deck {}", result.deck_id)));
    };

    let mut deltas = vec![("flashcardReviews", 1)];
    if result.correct == result.total {
        deltas.push(("flashcard100", 1));
    }
    if !deck.reviewed {
        deltas.push(("uniqueDecksReviewed", 1));
        store.merge(&path, &json!({ "reviewed": true }))?;
    }
    if profile::bump_counters(store, uid, &deltas)?.is_some() {
        profile::set_flags(store, uid, &[("completedFlashcardToday", true)])?;
        achievements::evaluate_and_store(store, uid)?;
    }
    tracing::info!(
        uid,
        deck_id = %result.deck_id,
        correct = result.correct,
        total = result.total,
        "flashcard review finished"
    );
    Ok(())
}

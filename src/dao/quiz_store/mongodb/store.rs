use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database, IndexModel,
    bson::{Bson, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        ANSWER_COLLECTION, MongoAnswerDocument, MongoParticipantDocument, MongoQuestionDocument,
        MongoQuizDocument, MongoSessionDocument, PARTICIPANT_COLLECTION, QUESTION_COLLECTION,
        QUIZ_COLLECTION, SESSION_COLLECTION, doc_id,
    },
};
use crate::dao::{
    models::{
        AnswerEntity, OptionEntity, ParticipantEntity, QuestionEntity, QuizEntity, SessionEntity,
    },
    quiz_store::QuizStore,
    storage::StorageResult,
};

#[derive(Clone)]
pub struct MongoQuizStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.state.read().await.database.clone();

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        self.state.write().await.database = database;
        Ok(())
    }
}

fn read_error(collection: &'static str) -> impl FnOnce(mongodb::error::Error) -> MongoDaoError {
    move |source| MongoDaoError::Read { collection, source }
}

fn write_error(
    collection: &'static str,
    id: impl ToString,
) -> impl FnOnce(mongodb::error::Error) -> MongoDaoError {
    let id = id.to_string();
    move |source| MongoDaoError::Write {
        collection,
        id,
        source,
    }
}

impl MongoQuizStore {
    /// Connect to MongoDB and make sure the indexes the engine relies on exist.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config.options, &config.database_name).await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                state: RwLock::new(MongoState { database }),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let indexes: [(&'static str, &'static str, Document, bool); 4] = [
            (SESSION_COLLECTION, "join_code", doc! {"join_code": 1}, true),
            (
                PARTICIPANT_COLLECTION,
                "session_id,joined_at",
                doc! {"session_id": 1, "joined_at": 1},
                false,
            ),
            (
                ANSWER_COLLECTION,
                "participant_id,question_id",
                doc! {"participant_id": 1, "question_id": 1},
                false,
            ),
            (
                QUESTION_COLLECTION,
                "quiz_id,position",
                doc! {"quiz_id": 1, "position": 1},
                false,
            ),
        ];

        for (collection, index, keys, unique) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{collection}_{}_idx", index.replace(',', "_"))))
                        .unique(Some(unique))
                        .build(),
                )
                .build();
            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        self.inner.state.read().await.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.database().await.collection::<T>(name)
    }

    async fn insert_quiz(&self, quiz: QuizEntity, questions: Vec<QuestionEntity>) -> MongoResult<()> {
        let quiz_id = quiz.id;
        let quizzes = self.collection::<MongoQuizDocument>(QUIZ_COLLECTION).await;
        quizzes
            .insert_one(MongoQuizDocument::from(quiz))
            .await
            .map_err(write_error(QUIZ_COLLECTION, quiz_id))?;

        if questions.is_empty() {
            return Ok(());
        }
        let documents = questions
            .into_iter()
            .map(MongoQuestionDocument::from)
            .collect::<Vec<_>>();
        self.collection::<MongoQuestionDocument>(QUESTION_COLLECTION)
            .await
            .insert_many(documents)
            .await
            .map_err(write_error(QUESTION_COLLECTION, quiz_id))?;
        Ok(())
    }

    async fn find_quiz(&self, id: Uuid) -> MongoResult<Option<QuizEntity>> {
        self.collection::<MongoQuizDocument>(QUIZ_COLLECTION)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(read_error(QUIZ_COLLECTION))?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn list_questions(&self, quiz_id: Uuid) -> MongoResult<Vec<QuestionEntity>> {
        let documents: Vec<MongoQuestionDocument> = self
            .collection::<MongoQuestionDocument>(QUESTION_COLLECTION)
            .await
            .find(doc! {"quiz_id": quiz_id.to_string()})
            .sort(doc! {"position": 1})
            .await
            .map_err(read_error(QUESTION_COLLECTION))?
            .try_collect()
            .await
            .map_err(read_error(QUESTION_COLLECTION))?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_question(&self, id: Uuid) -> MongoResult<Option<QuestionEntity>> {
        self.collection::<MongoQuestionDocument>(QUESTION_COLLECTION)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(read_error(QUESTION_COLLECTION))?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn find_option(&self, id: Uuid) -> MongoResult<Option<OptionEntity>> {
        let question = self
            .collection::<MongoQuestionDocument>(QUESTION_COLLECTION)
            .await
            .find_one(doc! {"options.id": id.to_string()})
            .await
            .map_err(read_error(QUESTION_COLLECTION))?
            .map(QuestionEntity::try_from)
            .transpose()?;

        Ok(question.and_then(|question| {
            question
                .options
                .into_iter()
                .find(|option| option.id == id)
        }))
    }

    async fn insert_session(&self, session: SessionEntity) -> MongoResult<()> {
        let id = session.id;
        self.collection::<MongoSessionDocument>(SESSION_COLLECTION)
            .await
            .insert_one(MongoSessionDocument::from(session))
            .await
            .map_err(write_error(SESSION_COLLECTION, id))?;
        Ok(())
    }

    async fn find_session(&self, filter: Document) -> MongoResult<Option<SessionEntity>> {
        self.collection::<MongoSessionDocument>(SESSION_COLLECTION)
            .await
            .find_one(filter)
            .await
            .map_err(read_error(SESSION_COLLECTION))?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn update_session(&self, session: SessionEntity) -> MongoResult<()> {
        let id = session.id;
        self.collection::<MongoSessionDocument>(SESSION_COLLECTION)
            .await
            .replace_one(doc_id(id), MongoSessionDocument::from(session))
            .await
            .map_err(write_error(SESSION_COLLECTION, id))?;
        Ok(())
    }

    async fn insert_participant(&self, participant: ParticipantEntity) -> MongoResult<()> {
        let id = participant.id;
        self.collection::<MongoParticipantDocument>(PARTICIPANT_COLLECTION)
            .await
            .insert_one(MongoParticipantDocument::from(participant))
            .await
            .map_err(write_error(PARTICIPANT_COLLECTION, id))?;
        Ok(())
    }

    async fn find_participant(&self, id: Uuid) -> MongoResult<Option<ParticipantEntity>> {
        self.collection::<MongoParticipantDocument>(PARTICIPANT_COLLECTION)
            .await
            .find_one(doc_id(id))
            .await
            .map_err(read_error(PARTICIPANT_COLLECTION))?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn list_participants(&self, session_id: Uuid) -> MongoResult<Vec<ParticipantEntity>> {
        let documents: Vec<MongoParticipantDocument> = self
            .collection::<MongoParticipantDocument>(PARTICIPANT_COLLECTION)
            .await
            .find(doc! {"session_id": session_id.to_string()})
            .sort(doc! {"joined_at": 1, "_id": 1})
            .await
            .map_err(read_error(PARTICIPANT_COLLECTION))?
            .try_collect()
            .await
            .map_err(read_error(PARTICIPANT_COLLECTION))?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn settle_answer(
        &self,
        participant_id: Uuid,
        index: u32,
        points: u32,
        advance_cursor: bool,
    ) -> MongoResult<Option<ParticipantEntity>> {
        let index = i64::from(index);
        let mut filter = doc_id(participant_id);
        filter.insert(
            "$or",
            vec![
                doc! {"settled_index": Bson::Null},
                doc! {"settled_index": {"$lt": index}},
            ],
        );
        let mut set = doc! {"settled_index": index};
        if advance_cursor {
            set.insert("question_cursor", index + 1);
        }

        let settled = self
            .collection::<MongoParticipantDocument>(PARTICIPANT_COLLECTION)
            .await
            .find_one_and_update(filter, doc! {"$inc": {"score": i64::from(points)}, "$set": set})
            .return_document(ReturnDocument::After)
            .await
            .map_err(write_error(PARTICIPANT_COLLECTION, participant_id))?;

        match settled {
            Some(document) => ParticipantEntity::try_from(document).map(Some),
            // already settled, or no such participant
            None => self.find_participant(participant_id).await,
        }
    }

    async fn set_cursor(&self, filter: Document, cursor: Option<u32>) -> MongoResult<u64> {
        let value = Bson::from(cursor.map(i64::from));
        let result = self
            .collection::<MongoParticipantDocument>(PARTICIPANT_COLLECTION)
            .await
            .update_many(filter.clone(), doc! {"$set": {"question_cursor": value}})
            .await
            .map_err(write_error(PARTICIPANT_COLLECTION, filter))?;
        Ok(result.modified_count)
    }

    async fn insert_answer(&self, answer: AnswerEntity) -> MongoResult<()> {
        let id = answer.id;
        self.collection::<MongoAnswerDocument>(ANSWER_COLLECTION)
            .await
            .insert_one(MongoAnswerDocument::from(answer))
            .await
            .map_err(write_error(ANSWER_COLLECTION, id))?;
        Ok(())
    }

    async fn find_answer(
        &self,
        participant_id: Uuid,
        question_id: Uuid,
    ) -> MongoResult<Option<AnswerEntity>> {
        self.collection::<MongoAnswerDocument>(ANSWER_COLLECTION)
            .await
            .find_one(doc! {
                "participant_id": participant_id.to_string(),
                "question_id": question_id.to_string(),
            })
            .await
            .map_err(read_error(ANSWER_COLLECTION))?
            .map(TryInto::try_into)
            .transpose()
    }
}

impl QuizStore for MongoQuizStore {
    fn insert_quiz(
        &self,
        quiz: QuizEntity,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_quiz(quiz, questions).await.map_err(Into::into) })
    }

    fn find_quiz(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<QuizEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_quiz(id).await.map_err(Into::into) })
    }

    fn list_questions(
        &self,
        quiz_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_questions(quiz_id).await.map_err(Into::into) })
    }

    fn find_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_question(id).await.map_err(Into::into) })
    }

    fn find_option(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<OptionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_option(id).await.map_err(Into::into) })
    }

    fn insert_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_session(session).await.map_err(Into::into) })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session(doc_id(id)).await.map_err(Into::into) })
    }

    fn find_session_by_code(
        &self,
        join_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_session(doc! {"join_code": join_code})
                .await
                .map_err(Into::into)
        })
    }

    fn update_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.update_session(session).await.map_err(Into::into) })
    }

    fn insert_participant(
        &self,
        participant: ParticipantEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_participant(participant).await.map_err(Into::into) })
    }

    fn find_participant(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_participant(id).await.map_err(Into::into) })
    }

    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_participants(session_id).await.map_err(Into::into) })
    }

    fn settle_answer(
        &self,
        participant_id: Uuid,
        index: u32,
        points: u32,
        advance_cursor: bool,
    ) -> BoxFuture<'static, StorageResult<Option<ParticipantEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .settle_answer(participant_id, index, points, advance_cursor)
                .await
                .map_err(Into::into)
        })
    }

    fn set_question_cursor(
        &self,
        participant_id: Uuid,
        cursor: Option<u32>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_cursor(doc_id(participant_id), cursor)
                .await
                .map(|_| ())
                .map_err(Into::into)
        })
    }

    fn reset_question_cursors(
        &self,
        session_id: Uuid,
        cursor: Option<u32>,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_cursor(doc! {"session_id": session_id.to_string()}, cursor)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_answer(answer).await.map_err(Into::into) })
    }

    fn find_answer(
        &self,
        participant_id: Uuid,
        question_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_answer(participant_id, question_id)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}

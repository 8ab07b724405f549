use crate::repositories::user_repository::{RepositoryError, UserRepository};
use crate::services::prompt;
use crate::services::quota_service::{self, QuotaError, QuotaService};
use crate::services::tutor_client::{
    GroundingSource, ImageAttachment, TutorClient, TutorClientError, TutorPrompt,
};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("User not found")]
    UserNotFound,
    #[error("Ask a question or attach a photo of the exercise")]
    EmptyQuestion,
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error(transparent)]
    Tutor(#[from] TutorClientError),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct AskRequest {
    pub email: String,
    pub question: String,
    pub image: Option<ImageAttachment>,
}

/// The answer shown to the student after a successful ask.
pub struct AnswerOutcome {
    pub text: String,
    pub sources: Vec<GroundingSource>,
    /// Questions left today after this one. `None` for unmetered accounts.
    pub remaining: Option<i64>,
}

/// The ask pipeline: admit against the daily quota, call the tutor model,
/// then commit the spend. A failed model call releases the slot so the
/// student is never charged for an answer they did not get.
pub struct QuestionService {
    repository: Arc<dyn UserRepository>,
    quota_service: Arc<QuotaService>,
    tutor_client: Arc<dyn TutorClient>,
}

impl QuestionService {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        quota_service: Arc<QuotaService>,
        tutor_client: Arc<dyn TutorClient>,
    ) -> Self {
        Self {
            repository,
            quota_service,
            tutor_client,
        }
    }

    pub async fn ask(
        &self,
        request: AskRequest,
        today: NaiveDate,
    ) -> Result<AnswerOutcome, AskError> {
        if request.question.trim().is_empty() && request.image.is_none() {
            return Err(AskError::EmptyQuestion);
        }

        let mut user = self
            .repository
            .find_by_email(&request.email)
            .await?
            .ok_or(AskError::UserNotFound)?;

        let reservation = self.quota_service.admit(&mut user, today).await?;

        let tutor_prompt = TutorPrompt {
            system_instructions: prompt::system_instructions(
                user.school_level,
                user.response_style,
                user.response_language,
            ),
            question: request.question,
            image: request.image,
        };

        let answer = match self.tutor_client.generate_answer(&tutor_prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                self.quota_service.release(&mut user, &reservation);
                warn!(email = %user.email, error = %e, "tutor call failed, slot released");
                return Err(AskError::Tutor(e));
            }
        };

        // The student already has their answer; a commit failure costs the
        // operator one uncounted question, not the student their answer.
        if let Err(e) = self.quota_service.commit(&reservation).await {
            warn!(email = %user.email, error = %e, "failed to persist question spend");
        }

        info!(email = %user.email, metered = reservation.is_metered(), "question answered");
        Ok(AnswerOutcome {
            text: answer.text,
            sources: dedup_sources(answer.sources),
            remaining: quota_service::remaining(&user, today),
        })
    }
}

/// Drop repeated citations, keeping the first occurrence of each URI.
fn dedup_sources(sources: Vec<GroundingSource>) -> Vec<GroundingSource> {
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .filter(|s| seen.insert(s.uri.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{ResponseLanguage, ResponseStyle, SchoolLevel, UserAccount};
    use crate::repositories::user_repository::MockUserRepository;
    use crate::services::tutor_client::{MockTutorClient, TutorAnswer};
    use mockall::predicate::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn account(requests_today: i64, date: NaiveDate) -> UserAccount {
        UserAccount {
            email: "student@example.com".to_string(),
            password_hash: "hash".to_string(),
            school_level: SchoolLevel::default(),
            response_style: ResponseStyle::default(),
            response_language: ResponseLanguage::default(),
            is_unlimited: false,
            requests_today,
            last_request_date: date,
            bonus_questions: 0,
            referred_by: None,
            created_at: None,
        }
    }

    fn request(question: &str) -> AskRequest {
        AskRequest {
            email: "student@example.com".to_string(),
            question: question.to_string(),
            image: None,
        }
    }

    fn service(
        repo: MockUserRepository,
        tutor: MockTutorClient,
    ) -> QuestionService {
        let repo: Arc<dyn UserRepository> = Arc::new(repo);
        QuestionService::new(
            repo.clone(),
            Arc::new(QuotaService::new(repo)),
            Arc::new(tutor),
        )
    }

    #[tokio::test]
    async fn successful_ask_spends_one_question() {
        let today = day("2026-01-05");
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_email()
            .times(1)
            .returning(move |_| Box::pin(async move { Ok(Some(account(1, today))) }));
        repo.expect_record_usage()
            .with(eq("student@example.com"), eq(2), eq(today))
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(()) }));

        let mut tutor = MockTutorClient::new();
        tutor.expect_generate_answer().times(1).returning(|_| {
            Box::pin(async {
                Ok(TutorAnswer {
                    text: "x = 3".to_string(),
                    sources: vec![],
                })
            })
        });

        let outcome = service(repo, tutor)
            .ask(request("Résoudre 2x + 1 = 7"), today)
            .await
            .unwrap();
        assert_eq!(outcome.text, "x = 3");
        assert_eq!(outcome.remaining, Some(3));
    }

    #[tokio::test]
    async fn failed_model_call_does_not_spend() {
        let today = day("2026-01-05");
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_email()
            .times(1)
            .returning(move |_| Box::pin(async move { Ok(Some(account(1, today))) }));
        repo.expect_record_usage().times(0);

        let mut tutor = MockTutorClient::new();
        tutor
            .expect_generate_answer()
            .times(1)
            .returning(|_| Box::pin(async { Err(TutorClientError::Timeout) }));

        let result = service(repo, tutor)
            .ask(request("Résoudre 2x + 1 = 7"), today)
            .await;
        assert!(matches!(result, Err(AskError::Tutor(TutorClientError::Timeout))));
    }

    #[tokio::test]
    async fn exhausted_quota_never_reaches_the_model() {
        let today = day("2026-01-05");
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_email()
            .times(1)
            .returning(move |_| Box::pin(async move { Ok(Some(account(5, today))) }));

        let mut tutor = MockTutorClient::new();
        tutor.expect_generate_answer().times(0);

        let result = service(repo, tutor)
            .ask(request("Encore une question"), today)
            .await;
        assert!(matches!(
            result,
            Err(AskError::Quota(QuotaError::QuotaExhausted { ceiling: 5 }))
        ));
    }

    #[tokio::test]
    async fn empty_question_without_image_is_rejected() {
        let repo = MockUserRepository::new();
        let tutor = MockTutorClient::new();

        let result = service(repo, tutor)
            .ask(request("   "), day("2026-01-05"))
            .await;
        assert!(matches!(result, Err(AskError::EmptyQuestion)));
    }

    #[tokio::test]
    async fn commit_failure_still_returns_the_answer() {
        let today = day("2026-01-05");
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_email()
            .times(1)
            .returning(move |_| Box::pin(async move { Ok(Some(account(0, today))) }));
        repo.expect_record_usage()
            .times(1)
            .returning(|_, _, _| Box::pin(async { Err(RepositoryError::NotFound) }));

        let mut tutor = MockTutorClient::new();
        tutor.expect_generate_answer().times(1).returning(|_| {
            Box::pin(async {
                Ok(TutorAnswer {
                    text: "Réponse".to_string(),
                    sources: vec![],
                })
            })
        });

        let outcome = service(repo, tutor)
            .ask(request("Question"), today)
            .await
            .unwrap();
        assert_eq!(outcome.text, "Réponse");
    }

    #[test]
    fn duplicate_sources_collapse() {
        let sources = vec![
            GroundingSource {
                title: "A".to_string(),
                uri: "https://a.example".to_string(),
            },
            GroundingSource {
                title: "A encore".to_string(),
                uri: "https://a.example".to_string(),
            },
            GroundingSource {
                title: "B".to_string(),
                uri: "https://b.example".to_string(),
            },
        ];
        let deduped = dedup_sources(sources);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "A");
        assert_eq!(deduped[1].uri, "https://b.example");
    }
}

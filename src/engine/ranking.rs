//! Ranking (§4.5), grounded on the reference stack's `state/score.rs`
//! `get_leaderboards` sort-by-score-descending idiom; the incremental
//! per-vote scoring rule is replaced with the recompute-from-answer-log
//! rule that §4.3/§4.5 require.

use super::Engine;
use crate::error::EngineResult;
use crate::ids::TriviaId;
use crate::protocol::{EngineEvent, RankingResult, RankingRow};

impl Engine {
    pub async fn ranking(&self, trivia_id: TriviaId) -> EngineResult<RankingResult> {
        self.repos.participations.recompute_scores_for_trivia(trivia_id).await?;

        let trivia = self
            .repos
            .trivias
            .get(trivia_id)
            .await?
            .ok_or_else(|| crate::error::EngineError::not_found(format!("trivia {trivia_id} not found")))?;

        // `list_by_trivia` already returns participations ordered by score
        // descending (§6); positions are assigned by that emission order.
        let participations = self.repos.participations.list_by_trivia(trivia_id).await?;
        let mut rows = Vec::with_capacity(participations.len());
        for (index, participation) in participations.into_iter().enumerate() {
            let user_name = self
                .repos
                .users
                .get(participation.user_id)
                .await?
                .map(|u| u.display_name)
                .unwrap_or_else(|| participation.user_id.to_string());
            rows.push(RankingRow {
                position: index as u32 + 1,
                user_id: participation.user_id,
                user_name,
                score: participation.score,
            });
        }

        Ok(RankingResult {
            trivia_status: trivia.status,
            rows,
        })
    }

    pub(super) async fn broadcast_ranking(&self, trivia_id: TriviaId) -> EngineResult<()> {
        let ranking = self.ranking(trivia_id).await?;
        self.hub.broadcast(trivia_id, EngineEvent::RankingUpdated(ranking)).await;
        Ok(())
    }
}

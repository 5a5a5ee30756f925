//! ジョブ一覧のモデルと提出状態。

use uuid::Uuid;

use crate::api::jobs::JobDto;

/// 提出フローの進行に応じたジョブ状態。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// 未割り当て（クレーム可能）。
    Available,
    /// クレーム要求を送信中。
    Claiming,
    /// 自分に割り当て済み（編集可能）。
    Assigned,
    /// 提出前のローカル検証中。
    Validating,
    /// 完了リクエストを送信中。
    Submitting,
    /// 完了済み（読み取り専用）。
    Completed,
    /// 提出失敗（エラーメッセージ付き、再編集可能）。
    Failed(String),
}

impl JobStatus {
    /// 提出処理が進行中かどうか。進行中は提出キーを無効化する。
    pub fn in_flight(&self) -> bool {
        matches!(self, JobStatus::Validating | JobStatus::Submitting)
    }

    /// フォームを編集できる状態かどうか。
    pub fn editable(&self) -> bool {
        matches!(self, JobStatus::Assigned | JobStatus::Failed(_))
    }
}

/// バックエンド上のジョブ1件とローカルの表示状態。
#[derive(Clone, Debug)]
pub struct Job {
    /// 状態更新に使う安定ID。
    pub id: Uuid,
    /// バックエンドのジョブID（24桁hexが正準形式）。
    pub remote_id: String,
    /// 表示用タイトル。
    pub title: String,
    /// 現場の所在地。
    pub location: String,
    /// 予定日（あれば）。
    pub scheduled_date: Option<String>,
    /// 現在の状態。
    pub status: JobStatus,
}

impl Job {
    /// バックエンドのDTOからジョブを作成する。
    pub fn from_dto(dto: JobDto) -> Self {
        // サーバーの状態文字列をローカル状態へ対応付ける。
        let status = match dto.status.as_str() {
            "available" => JobStatus::Available,
            "completed" => JobStatus::Completed,
            _ => JobStatus::Assigned,
        };
        Self {
            id: Uuid::new_v4(),
            remote_id: dto.id,
            title: dto.title,
            location: dto.location,
            scheduled_date: dto.scheduled_date,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(status: &str) -> JobDto {
        serde_json::from_value(serde_json::json!({
            "id": "64a1f2c3d4e5f60718293a4b",
            "title": "Boiler inspection",
            "location": "12 Canal St",
            "status": status,
        }))
        .unwrap()
    }

    #[test]
    fn test_status_mapping_from_backend() {
        // サーバーの状態文字列がローカル状態へ対応付けられることを検証する。
        assert_eq!(Job::from_dto(dto("available")).status, JobStatus::Available);
        assert_eq!(Job::from_dto(dto("completed")).status, JobStatus::Completed);
        assert_eq!(Job::from_dto(dto("assigned")).status, JobStatus::Assigned);
    }

    #[test]
    fn test_in_flight_blocks_only_submission_phases() {
        // 検証中と送信中だけが進行中扱いになる。
        assert!(JobStatus::Validating.in_flight());
        assert!(JobStatus::Submitting.in_flight());
        assert!(!JobStatus::Assigned.in_flight());
        assert!(!JobStatus::Failed("x".into()).in_flight());
    }

    #[test]
    fn test_failed_jobs_stay_editable() {
        // 失敗後もデータを保持したまま再編集できる。
        assert!(JobStatus::Failed("network".into()).editable());
        assert!(!JobStatus::Completed.editable());
    }
}

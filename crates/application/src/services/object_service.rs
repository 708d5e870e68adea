//! 媒体对象服务
//!
//! 只做签名与登记, 字节流不经过本服务。

use std::sync::Arc;

use domain::errors::{DomainError, DomainResult};
use domain::object::ENGINE_MINIO;
use domain::repositories::object_repository::{ObjectRepository, SessionObjectRepository};
use domain::repositories::session_user_repository::SessionUserRepository;

use crate::dto::{GetUploadParamsReq, GetUploadParamsRes};
use crate::ports::ObjectStorage;

pub struct ObjectService {
    session_users: Arc<dyn SessionUserRepository>,
    objects: Arc<dyn ObjectRepository>,
    session_objects: Arc<dyn SessionObjectRepository>,
    storage: Arc<dyn ObjectStorage>,
}

impl ObjectService {
    pub fn new(
        session_users: Arc<dyn SessionUserRepository>,
        objects: Arc<dyn ObjectRepository>,
        session_objects: Arc<dyn SessionObjectRepository>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            session_users,
            objects,
            session_objects,
            storage,
        }
    }

    /// 签发上传参数并登记对象; uid=0 为服务端调用, 跳过成员校验
    pub async fn upload_params(
        &self,
        req: GetUploadParamsReq,
    ) -> DomainResult<GetUploadParamsRes> {
        if req.file_name.is_empty() {
            return Err(DomainError::ParamsError);
        }
        if req.user_id > 0 {
            self.session_users
                .find_one(req.session_id, req.user_id)
                .await?
                .ok_or(DomainError::Forbidden)?;
        }
        let key = format!(
            "session-{}/{}/{}-{}",
            req.session_id,
            req.user_id,
            req.client_id,
            urlencoding::encode(&req.file_name)
        );
        let (url, method, params) = self.storage.upload_params(&key).await?;
        let id = self.objects.insert(req.session_id, ENGINE_MINIO, &key).await?;
        self.session_objects
            .insert(id, req.session_id, req.user_id, req.client_id)
            .await?;
        Ok(GetUploadParamsRes {
            id,
            url,
            method,
            params,
        })
    }

    /// 签发下载地址; uid=0 为服务端直查, 否则校验对象归属
    pub async fn download_url(&self, object_id: i64, user_id: i64) -> DomainResult<String> {
        let object = if user_id == 0 {
            self.objects.find(object_id).await?
        } else {
            self.objects.find_for_user(object_id, user_id).await?
        };
        let object = object.ok_or(DomainError::ParamsError)?;
        self.storage.download_url(&object.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::*;

    fn upload_req(session_id: i64, user_id: i64) -> GetUploadParamsReq {
        GetUploadParamsReq {
            session_id,
            user_id,
            client_id: 11,
            file_name: "pic 1.png".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upload_params_registers_object() {
        let env = TestEnv::new();
        let sessions = env.session_service();
        let objects = env.object_service();
        let res = sessions
            .create(group_create_req(7, 55, vec![8]))
            .await
            .unwrap();

        let out = objects.upload_params(upload_req(res.session_id, 7)).await.unwrap();
        assert!(out.id > 0);
        assert_eq!(out.method, "PUT");
        // 文件名参与 key 且经过编码
        assert!(out.url.contains("pic%201.png"));
    }

    #[tokio::test]
    async fn test_upload_params_rejects_non_member() {
        let env = TestEnv::new();
        let sessions = env.session_service();
        let objects = env.object_service();
        let res = sessions
            .create(group_create_req(7, 55, vec![8]))
            .await
            .unwrap();
        assert_eq!(
            objects
                .upload_params(upload_req(res.session_id, 42))
                .await
                .unwrap_err(),
            DomainError::Forbidden
        );
    }

    #[tokio::test]
    async fn test_download_url_checks_ownership() {
        let env = TestEnv::new();
        let sessions = env.session_service();
        let objects = env.object_service();
        let res = sessions
            .create(group_create_req(7, 55, vec![8]))
            .await
            .unwrap();
        let out = objects.upload_params(upload_req(res.session_id, 7)).await.unwrap();

        assert!(objects.download_url(out.id, 8).await.is_ok());
        // 服务端直查
        assert!(objects.download_url(out.id, 0).await.is_ok());
        // 非会话成员
        assert_eq!(
            objects.download_url(out.id, 42).await.unwrap_err(),
            DomainError::ParamsError
        );
    }
}

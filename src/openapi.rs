//! OpenAPI document of the resource schemas, served at `/api/openapi.json`.

use crate::models::{
    Asset, AssetFields, AssetType, Doctor, DoctorFields, ExamCategory, ExamCategoryFields, ExamCategoryView, ExamItem,
    ExamItemFields, ExamItemView, HistoryType, ImagingRequest, ImagingRequestFields, ImagingRequestHistory,
    ImagingRequestView, ProfileFields, UserView,
};
use crate::service::LoginResponse;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "clinic-admin",
        description = "Hospital administration API: IT assets, staff, exam catalog and imaging requests. \
                       Authenticate with `Authorization: Token <key>` obtained from `POST /api/auth`."
    ),
    components(schemas(
        Asset,
        AssetFields,
        AssetType,
        UserView,
        ProfileFields,
        Doctor,
        DoctorFields,
        ExamCategory,
        ExamCategoryFields,
        ExamCategoryView,
        ExamItem,
        ExamItemFields,
        ExamItemView,
        ImagingRequest,
        ImagingRequestFields,
        ImagingRequestView,
        ImagingRequestHistory,
        HistoryType,
        LoginResponse,
    )),
    tags(
        (name = "auth", description = "Token login"),
        (name = "assets", description = "IT inventory"),
        (name = "users", description = "Staff users, profiles and doctors"),
        (name = "exams", description = "Exam catalog"),
        (name = "imaging", description = "Imaging requests, history and PDF"),
    )
)]
pub struct ApiDoc;
